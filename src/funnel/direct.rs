//! Résolution directe pour les serveurs classiques.
//!
//! Certains serveurs n'imposent pas le tunnel complet: un bouton de
//! téléchargement parmi quelques variantes connues, puis un bouton de
//! validation dont le href est le lien final. L'absence de résultat n'est
//! pas une erreur, l'appelant passe simplement au serveur suivant.
use tracing::{info, warn};

use crate::browser::click::{ClickOptions, click_element};
use crate::browser::defense;
use crate::browser::driver::{Driver, DriverError, DriverResult, Element};
use crate::browser::locator::{RetryBudget, wait_for_any_clickable, wait_for_clickable};
use crate::browser::wait::{Poll, wait_for_page_ready};
use crate::config::SiteProfile;

/// Tente d'obtenir le lien final d'un serveur classique.
pub async fn resolve_classic<D: Driver>(
    driver: &D,
    profile: &SiteProfile,
    server_link: &str,
) -> DriverResult<Option<String>> {
    let t = &profile.timeouts;
    info!("résolution directe du lien serveur: {server_link}");
    driver.navigate(server_link).await?;
    wait_for_page_ready(driver, Poll::new(t.page_ready(), t.poll_interval())).await;

    let budget = RetryBudget::single(t.classic_button(), t.poll_interval());
    let button = match wait_for_any_clickable(driver, &profile.classic_button_locators, budget, || async move {
        let _ = defense::sweep_overlays(driver).await;
    })
    .await
    {
        Ok(button) => button,
        Err(DriverError::Timeout(_)) => {
            warn!("aucun bouton de téléchargement reconnu sur ce serveur");
            return Ok(None);
        }
        Err(other) => return Err(other),
    };

    click_element(driver, &button, ClickOptions::in_place(t.poll_interval())).await?;

    let submit = match wait_for_clickable(driver, &profile.classic_submit_locator, budget, || async move {})
        .await
    {
        Ok(submit) => submit,
        Err(DriverError::Timeout(_)) => {
            warn!("bouton de validation introuvable");
            return Ok(None);
        }
        Err(other) => return Err(other),
    };

    let href = submit.attr("href").await?;
    if let Some(url) = &href {
        info!("lien final obtenu: {url}");
    }
    Ok(href)
}
