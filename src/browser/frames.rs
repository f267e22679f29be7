//! Recherche du bouton de téléchargement final à travers les frames.
//!
//! Le site déplace ce contrôle au gré des révisions: tantôt dans le document
//! principal, tantôt dans une iframe dont l'id ou le nom trahit la cible,
//! tantôt remplacé par une publicité le temps d'un chargement. La recherche
//! est bornée par une échéance murale; c'est le point d'échec récupérable
//! principal du tunnel.
use tokio::time::Instant;
use tracing::debug;

use crate::browser::defense;
use crate::browser::driver::{Driver, DriverError, DriverResult, Element, Locator};
use crate::browser::locator::{RetryBudget, wait_for_clickable};
use crate::config::{ButtonTarget, SiteProfile};

/// Cherche la première variante de [`ButtonTarget`] cliquable, dans le
/// document principal puis dans chaque iframe, les frames dont
/// l'identifiant contient le jeton indice étant visitées d'abord.
///
/// Rend l'élément et la variante reconnue (son délai de stabilisation est
/// nécessaire au clic). Le focus reste dans le contexte où l'élément a été
/// trouvé. Échéance dépassée: erreur de type délai dépassé.
pub async fn wait_for_final_button<'p, D: Driver>(
    driver: &D,
    profile: &'p SiteProfile,
) -> DriverResult<(D::Elem, &'p ButtonTarget)> {
    let deadline = Instant::now() + profile.timeouts.final_button_deadline();
    let attempt = RetryBudget::single(profile.timeouts.frame_attempt(), profile.timeouts.poll_interval());
    let iframe_locator = Locator::css("iframe");
    let hint = profile.frame_hint.to_lowercase();

    loop {
        driver.enter_default_frame().await?;

        // Passe de premier niveau: une tentative courte par localisateur.
        if let Some(found) = try_targets(driver, profile, attempt, true).await? {
            return Ok(found);
        }

        // Énumération des iframes du document principal.
        let frames = driver.find_all(&iframe_locator).await.unwrap_or_default();
        let mut prioritized = Vec::new();
        let mut others = Vec::new();
        for frame in frames {
            let id = lowered_attr(&frame, "id").await;
            let name = lowered_attr(&frame, "name").await;
            if id.contains(&hint) || name.contains(&hint) {
                prioritized.push(frame);
            } else {
                others.push(frame);
            }
        }

        for frame in prioritized.into_iter().chain(others) {
            if driver.enter_frame(&frame).await.is_err() {
                debug!("frame inaccessible, ignorée");
                let _ = driver.enter_default_frame().await;
                continue;
            }
            if let Some(found) = try_targets(driver, profile, attempt, false).await? {
                return Ok(found);
            }
            driver.enter_default_frame().await?;
        }

        if Instant::now() >= deadline {
            let _ = driver.enter_default_frame().await;
            return Err(DriverError::Timeout(
                "bouton de téléchargement final introuvable avant l'échéance".into(),
            ));
        }
    }
}

/// Essaie chaque variante dans l'ordre. Au premier niveau le crochet
/// pré-tentative ramène le focus au document principal avant le balayage;
/// dans une frame il se contente du balayage pour ne pas perdre le contexte.
async fn try_targets<'p, D: Driver>(
    driver: &D,
    profile: &'p SiteProfile,
    attempt: RetryBudget,
    top_level: bool,
) -> DriverResult<Option<(D::Elem, &'p ButtonTarget)>> {
    for target in &profile.button_targets {
        for locator in &target.locators {
            let outcome = wait_for_clickable(driver, locator, attempt, || async move {
                if top_level {
                    let _ = driver.enter_default_frame().await;
                }
                let _ = defense::sweep_overlays(driver).await;
            })
            .await;
            match outcome {
                Ok(element) => {
                    debug!(variante = %target.name, %locator, "bouton final localisé");
                    return Ok(Some((element, target)));
                }
                Err(DriverError::Timeout(_)) => continue,
                Err(other) => return Err(other),
            }
        }
    }
    Ok(None)
}

async fn lowered_attr<E: Element>(element: &E, name: &str) -> String {
    element
        .attr(name)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeDriver, FakeElement};

    fn fast_profile() -> SiteProfile {
        let mut profile = SiteProfile::default();
        profile.timeouts.final_button_deadline_secs = 0.3;
        profile.timeouts.frame_attempt_secs = 0.01;
        profile.timeouts.poll_interval_ms = 2;
        profile
    }

    #[tokio::test]
    async fn trouve_le_bouton_au_premier_niveau() {
        let profile = fast_profile();
        let driver = FakeDriver::new();
        driver.add_element("//*[@id='F1']/button", FakeElement::new("bouton-f1").clickable(true));

        let (element, target) = wait_for_final_button(&driver, &profile).await.unwrap();
        assert_eq!(element.key(), "bouton-f1");
        assert_eq!(target.name, "bouton principal du conteneur F1");
    }

    #[tokio::test]
    async fn visite_d_abord_la_frame_dont_l_id_contient_l_indice() {
        let profile = fast_profile();
        let driver = FakeDriver::new();
        driver.add_frame(FakeElement::new("pub").with_attr("id", "bannerzone"));
        driver.add_frame(FakeElement::new("cible").with_attr("id", "F1-holder"));
        driver.add_frame_element("cible", "button.submit-btn", FakeElement::new("submit").clickable(true));

        let (element, target) = wait_for_final_button(&driver, &profile).await.unwrap();
        assert_eq!(element.key(), "submit");
        assert_eq!(target.name, "variante submit");
        // La frame prioritaire a été visitée avant la frame publicitaire.
        assert_eq!(driver.entered_frames().first().map(String::as_str), Some("cible"));
    }

    #[tokio::test]
    async fn une_frame_inaccessible_est_ignoree() {
        let profile = fast_profile();
        let driver = FakeDriver::new();
        driver.add_frame(FakeElement::new("morte").with_attr("id", "f1-old").refuse_entry());
        driver.add_frame(FakeElement::new("vivante").with_attr("name", "F1"));
        driver.add_frame_element("vivante", "#F1 button", FakeElement::new("repli").clickable(true));

        let (element, target) = wait_for_final_button(&driver, &profile).await.unwrap();
        assert_eq!(element.key(), "repli");
        assert_eq!(target.name, "repli bouton F1");
    }

    #[tokio::test]
    async fn echoue_en_delai_depasse_quand_rien_ne_correspond() {
        let mut profile = fast_profile();
        profile.timeouts.final_button_deadline_secs = 0.05;
        let driver = FakeDriver::new();
        driver.add_frame(FakeElement::new("vide").with_attr("id", "autre"));

        let err = wait_for_final_button(&driver, &profile).await.unwrap_err();
        assert!(err.is_timeout());
        // Le focus est ramené au document principal avant de rendre l'erreur.
        assert!(driver.current_frame().is_none());
    }
}
