//! Primitives d'attente coopérative.
//!
//! Toutes les suspensions du pipeline passent par [`poll_until`]: un sondage
//! borné dont le délai total et l'intervalle sont explicites dans l'API,
//! jamais des boucles de sommeil enfouies. Aucune attente n'est illimitée.
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::browser::driver::Driver;

/// Paramètres d'un sondage borné.
#[derive(Debug, Clone, Copy)]
pub struct Poll {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Poll {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Sonde `probe` jusqu'à obtenir `Some(_)` ou épuiser le délai.
///
/// La sonde est toujours évaluée au moins une fois, même avec un délai nul.
pub async fn poll_until<F, Fut, T>(poll: Poll, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + poll.timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(poll.interval).await;
    }
}

/// Attend que le document courant soit complètement chargé.
/// Le dépassement du délai est toléré, comme une page lente mais exploitable.
pub async fn wait_for_page_ready<D: Driver>(driver: &D, poll: Poll) {
    let ready = poll_until(poll, || async move {
        match driver.ready_state().await {
            Ok(state) if state == "complete" => Some(()),
            _ => None,
        }
    })
    .await;
    if ready.is_none() {
        tracing::debug!("document toujours incomplet après le délai, on continue");
    }
}

/// Attend que l'URL courante commence par `prefix`.
pub async fn wait_for_url_prefix<D: Driver>(driver: &D, prefix: &str, poll: Poll) -> bool {
    poll_until(poll, || async move {
        match driver.current_url().await {
            Ok(url) if url.starts_with(prefix) => Some(()),
            _ => None,
        }
    })
    .await
    .is_some()
}
