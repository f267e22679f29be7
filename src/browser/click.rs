//! Exécution d'un clic sous environnement hostile.
//!
//! Un clic natif peut être intercepté par une superposition arrivée entre la
//! localisation et l'interaction, ou viser une poignée devenue obsolète;
//! dans les deux cas on retombe sur un clic par script sur la même poignée.
//! L'ouverture éventuelle d'une fenêtre est détectée par différence entre
//! deux instantanés de l'ensemble des poignées de fenêtres, l'instantané
//! «avant» n'étant jamais modifié.
use std::time::Duration;

use tracing::debug;

use crate::browser::defense;
use crate::browser::driver::{Driver, DriverError, DriverResult, Element};
use crate::browser::wait::{Poll, poll_until};

const SCROLL_CENTER_JS: &str = "arguments[0].scrollIntoView({block: 'center'});";
const SCRIPT_CLICK_JS: &str = "arguments[0].click();";

/// Comportement d'un clic.
#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
    /// Si vrai, guette l'ouverture d'une fenêtre pendant `window_timeout`
    /// et bascule le focus dessus. L'absence d'ouverture n'est pas une
    /// erreur: certains parcours naviguent sur place.
    pub expect_new_window: bool,
    pub window_timeout: Duration,
    pub poll_interval: Duration,
    /// Seconde obsolescence dans le repli par script: retenter une fois au
    /// lieu de propager.
    pub retry_stale_script_click: bool,
}

impl ClickOptions {
    pub fn in_place(poll_interval: Duration) -> Self {
        Self {
            expect_new_window: false,
            window_timeout: Duration::ZERO,
            poll_interval,
            retry_stale_script_click: false,
        }
    }

    pub fn expecting_window(window_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            expect_new_window: true,
            window_timeout,
            poll_interval,
            retry_stale_script_click: false,
        }
    }
}

/// Clique sur `element` et rapporte si une nouvelle fenêtre s'est ouverte
/// (le focus est alors déjà basculé sur la plus récente).
pub async fn click_element<D: Driver>(
    driver: &D,
    element: &D::Elem,
    opts: ClickOptions,
) -> DriverResult<bool> {
    driver.execute_on(SCROLL_CENTER_JS, element).await?;
    // Des publicités ont pu se charger depuis la localisation.
    defense::sweep_overlays(driver).await?;

    let before = driver.windows().await?;

    match element.click().await {
        Ok(()) => {}
        Err(DriverError::Intercepted(reason)) | Err(DriverError::Stale(reason)) => {
            debug!("clic natif rejeté ({reason}), repli par script");
            script_click(driver, element, opts.retry_stale_script_click).await?;
        }
        Err(other) => return Err(other),
    }

    if !opts.expect_new_window {
        return Ok(false);
    }

    let before_len = before.len();
    let grown = poll_until(Poll::new(opts.window_timeout, opts.poll_interval), || async move {
        let handles = driver.windows().await.ok()?;
        if handles.len() > before_len { Some(handles) } else { None }
    })
    .await;

    match grown {
        Some(after) => {
            let mut fresh = after.into_iter().filter(|h| !before.contains(h));
            match fresh.next_back() {
                Some(newest) => {
                    driver.switch_to_window(&newest).await?;
                    debug!("nouvelle fenêtre détectée, focus basculé");
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        None => Ok(false),
    }
}

async fn script_click<D: Driver>(
    driver: &D,
    element: &D::Elem,
    retry_stale: bool,
) -> DriverResult<()> {
    match driver.execute_on(SCRIPT_CLICK_JS, element).await {
        Ok(()) => Ok(()),
        Err(DriverError::Stale(reason)) if retry_stale => {
            debug!("poignée obsolète dans le repli ({reason}), dernière retentative");
            driver.execute_on(SCRIPT_CLICK_JS, element).await
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeDriver, FakeElement};

    fn opts_window() -> ClickOptions {
        ClickOptions::expecting_window(Duration::from_millis(100), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn un_clic_qui_ouvre_une_fenetre_bascule_le_focus() {
        let driver = FakeDriver::new();
        let element = FakeElement::new("dl").clickable(true).opens_window("fenetre-2");
        let driver_el = driver.register(element);

        let opened = click_element(&driver, &driver_el, opts_window()).await.unwrap();
        assert!(opened);
        assert_eq!(driver.current_window(), "fenetre-2");
    }

    #[tokio::test]
    async fn sans_ouverture_le_focus_reste_inchange() {
        let driver = FakeDriver::new();
        let driver_el = driver.register(FakeElement::new("dl").clickable(true));

        let opened = click_element(&driver, &driver_el, opts_window()).await.unwrap();
        assert!(!opened);
        assert_eq!(driver.current_window(), "fenetre-1");
    }

    #[tokio::test]
    async fn le_clic_intercepte_retombe_sur_le_script() {
        let driver = FakeDriver::new();
        let driver_el = driver.register(FakeElement::new("dl").clickable(true).intercept_first_click());

        let opened = click_element(
            &driver,
            &driver_el,
            ClickOptions::in_place(Duration::from_millis(5)),
        )
        .await
        .unwrap();
        assert!(!opened);
        assert_eq!(driver.executed_count(SCRIPT_CLICK_JS), 1);
    }

    #[tokio::test]
    async fn la_double_obsolescence_se_propage_par_defaut() {
        let driver = FakeDriver::new();
        let driver_el = driver.register(FakeElement::new("dl").clickable(true).always_stale());

        let err = click_element(
            &driver,
            &driver_el,
            ClickOptions::in_place(Duration::from_millis(5)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DriverError::Stale(_)));
    }

    #[tokio::test]
    async fn l_instantane_avant_n_est_pas_modifie() {
        let driver = FakeDriver::new();
        let driver_el = driver.register(FakeElement::new("dl").clickable(true).opens_window("popup"));

        let before = driver.windows().await.unwrap();
        click_element(&driver, &driver_el, opts_window()).await.unwrap();
        // L'ensemble observé avant le clic doit rester tel quel.
        assert_eq!(before, vec!["fenetre-1".to_string()]);
        assert_eq!(driver.windows().await.unwrap().len(), 2);
    }
}
