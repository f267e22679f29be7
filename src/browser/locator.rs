//! Localisation d'éléments avec budget de tentatives.
//!
//! Les retentatives couvrent l'absence *transitoire* (élément pas encore
//! rendu). Une absence structurelle se termine toujours après le budget
//! fixé: aucune boucle infinie, l'échec remonte comme délai dépassé.
use std::future::Future;
use std::time::Duration;

use crate::browser::driver::{Driver, DriverError, DriverResult, Element, Locator, LocatorSpec};
use crate::browser::wait::{Poll, poll_until};

/// Budget d'une recherche: `max_attempts` tentatives, chacune sondant
/// jusqu'à `wait` avec l'intervalle donné.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub wait: Duration,
    pub interval: Duration,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, wait: Duration, interval: Duration) -> Self {
        Self { max_attempts, wait, interval }
    }

    /// Une seule tentative courte, utilisée pendant le balayage des frames.
    pub fn single(wait: Duration, interval: Duration) -> Self {
        Self::new(1, wait, interval)
    }
}

/// Attend qu'un élément localisé par `locator` devienne cliquable.
///
/// Avant chaque tentative, `pre_attempt` est exécuté (typiquement: retour au
/// document de premier niveau puis balayage de la défense de page). Budget
/// épuisé sans élément interactif: erreur de type délai dépassé.
pub async fn wait_for_clickable<D, F, Fut>(
    driver: &D,
    locator: &Locator,
    budget: RetryBudget,
    mut pre_attempt: F,
) -> DriverResult<D::Elem>
where
    D: Driver,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    for _ in 0..budget.max_attempts {
        pre_attempt().await;
        let found = poll_until(Poll::new(budget.wait, budget.interval), || async move {
            let element = driver.find(locator).await.ok()?;
            match element.is_clickable().await {
                Ok(true) => Some(element),
                _ => None,
            }
        })
        .await;
        if let Some(element) = found {
            return Ok(element);
        }
    }
    Err(DriverError::Timeout(format!(
        "aucun élément cliquable pour {locator} après {} tentatives",
        budget.max_attempts
    )))
}

/// Essaie les alternatives d'un [`LocatorSpec`] dans l'ordre; la première
/// qui produit un élément cliquable gagne.
pub async fn wait_for_any_clickable<D, F, Fut>(
    driver: &D,
    spec: &LocatorSpec,
    budget: RetryBudget,
    mut pre_attempt: F,
) -> DriverResult<D::Elem>
where
    D: Driver,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    for locator in spec {
        match wait_for_clickable(driver, locator, budget, &mut pre_attempt).await {
            Ok(element) => return Ok(element),
            Err(DriverError::Timeout(_)) => continue,
            Err(other) => return Err(other),
        }
    }
    Err(DriverError::Timeout(format!(
        "aucune des {} alternatives n'a produit d'élément cliquable",
        spec.len()
    )))
}
