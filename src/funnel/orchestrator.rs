//! Machine à états du tunnel de téléchargement.
//!
//! Étapes dans l'ordre: page vidéo (sautable) → page de téléchargement →
//! sélection de la qualité → bouton final → lien post-téléchargement.
//! Chaque étape rend un résultat explicite inspecté par la boucle de
//! transition; après chaque clic navigant, l'URL obtenue est confirmée par
//! préfixe, une navigation directe servant de rattrapage. Le tout tourne
//! dans une boucle externe bornée: toute condition non gérée avorte la
//! tentative, détruit la session et repart du début avec une session
//! neuve — jamais de reprise partielle.
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::browser::click::{ClickOptions, click_element};
use crate::browser::defense;
use crate::browser::driver::{Driver, DriverError, DriverFactory, Locator};
use crate::browser::frames::wait_for_final_button;
use crate::browser::locator::{RetryBudget, wait_for_clickable};
use crate::browser::wait::{Poll, wait_for_page_ready, wait_for_url_prefix};
use crate::config::SiteProfile;
use crate::funnel::quality::{QualityError, collect_quality_options, select_quality_option};

/// Paramètres d'une exécution du tunnel.
#[derive(Debug, Clone)]
pub struct FunnelRequest {
    pub video_id: String,
    pub quality_label: String,
    pub allow_prompt: bool,
    /// Exiger une correspondance de qualité au lieu du repli silencieux.
    pub require_quality_match: bool,
    pub base_url: String,
    pub start_from_download: bool,
    pub download_page_url: Option<String>,
}

/// Échec d'une étape du tunnel.
///
/// `Driver` couvre à la fois l'absence structurelle (délai dépassé) et les
/// conditions fatales pour la session; les deux remontent à la boucle de
/// retentative. `Quality` est définitif: retenter ne changera rien.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("sélection de qualité: {0}")]
    Quality(#[from] QualityError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    VideoPage,
    DownloadPage,
    SelectQuality,
    FinalButton,
    PostDownloadLink,
}

struct Funnel<'a, D: Driver> {
    driver: &'a D,
    profile: &'a SiteProfile,
    request: &'a FunnelRequest,
    download_page_url: &'a str,
}

impl<'a, D: Driver> Funnel<'a, D> {
    async fn run(&self) -> Result<String, StageError> {
        let mut stage = if self.request.start_from_download {
            Stage::DownloadPage
        } else {
            Stage::VideoPage
        };
        loop {
            debug!(etape = ?stage, "transition du tunnel");
            stage = match stage {
                Stage::VideoPage => {
                    self.traverse_video_page().await?;
                    Stage::SelectQuality
                }
                Stage::DownloadPage => {
                    self.open_download_page().await?;
                    Stage::SelectQuality
                }
                Stage::SelectQuality => {
                    self.choose_quality().await?;
                    Stage::FinalButton
                }
                Stage::FinalButton => {
                    self.click_final_button().await?;
                    Stage::PostDownloadLink
                }
                Stage::PostDownloadLink => return self.click_post_download_link().await,
            };
        }
    }

    fn poll(&self, timeout: Duration) -> Poll {
        Poll::new(timeout, self.profile.timeouts.poll_interval())
    }

    /// Clic navigant: guette l'ouverture d'une fenêtre pendant
    /// `window_timeout`, avec la retentative d'obsolescence du profil.
    fn click_opts(&self, window_timeout: Duration) -> ClickOptions {
        ClickOptions {
            expect_new_window: true,
            window_timeout,
            poll_interval: self.profile.timeouts.poll_interval(),
            retry_stale_script_click: self.profile.retry_stale_script_click,
        }
    }

    /// Attente de chargement après un clic navigant: plus généreuse quand le
    /// site a ouvert une nouvelle fenêtre.
    async fn settle_navigation(&self, new_window: bool) {
        let t = &self.profile.timeouts;
        let timeout = if new_window { t.page_ready_window() } else { t.page_ready_short() };
        wait_for_page_ready(self.driver, self.poll(timeout)).await;
    }

    /// Confirme que l'URL courante porte le préfixe attendu, sinon navigue
    /// directement vers l'URL attendue plutôt que d'échouer.
    async fn confirm_or_force(&self, expected: &str) -> Result<(), StageError> {
        let t = &self.profile.timeouts;
        if !wait_for_url_prefix(self.driver, expected, self.poll(t.url_confirm())).await {
            info!("URL inattendue, navigation directe de rattrapage vers {expected}");
            self.driver.navigate(expected).await?;
            wait_for_page_ready(self.driver, self.poll(t.page_ready())).await;
        }
        Ok(())
    }

    /// Page vidéo: clic sur le lien «Download» puis arrivée confirmée sur la
    /// page de téléchargement.
    async fn traverse_video_page(&self) -> Result<(), StageError> {
        let t = &self.profile.timeouts;
        let video_url = self.profile.video_url(&self.request.base_url, &self.request.video_id);
        info!("ouverture de la page vidéo: {video_url}");
        self.driver.navigate(&video_url).await?;
        wait_for_page_ready(self.driver, self.poll(t.page_ready())).await;
        defense::sweep_overlays(self.driver).await?;

        let locator = Locator::xpath(self.profile.download_link_xpath.clone());
        let budget = RetryBudget::single(t.download_button(), t.poll_interval());
        let link = wait_for_clickable(self.driver, &locator, budget, || async move {
            let _ = defense::sweep_overlays(self.driver).await;
        })
        .await?;

        info!("clic sur le bouton Download");
        let opened = click_element(self.driver, &link, self.click_opts(t.new_window())).await?;
        self.settle_navigation(opened).await;
        self.confirm_or_force(self.download_page_url).await
    }

    /// Entrée directe sur la page de téléchargement.
    async fn open_download_page(&self) -> Result<(), StageError> {
        info!("ouverture directe de la page de téléchargement: {}", self.download_page_url);
        self.driver.navigate(self.download_page_url).await?;
        wait_for_page_ready(self.driver, self.poll(self.profile.timeouts.page_ready())).await;
        defense::sweep_overlays(self.driver).await?;
        Ok(())
    }

    async fn choose_quality(&self) -> Result<(), StageError> {
        let t = &self.profile.timeouts;
        defense::sweep_overlays(self.driver).await?;
        let options =
            collect_quality_options(self.driver, self.profile, &self.request.video_id).await?;
        let selected = select_quality_option(
            &options,
            self.profile,
            &self.request.quality_label,
            self.request.allow_prompt,
            self.request.require_quality_match,
            read_stdin_line,
        )?;

        info!("clic sur le lien de qualité '{}'", selected.label);
        let opened =
            click_element(self.driver, &selected.element, self.click_opts(t.new_window())).await?;
        self.settle_navigation(opened).await;
        self.confirm_or_force(&selected.href).await
    }

    async fn click_final_button(&self) -> Result<(), StageError> {
        let t = &self.profile.timeouts;
        let (button, target) = wait_for_final_button(self.driver, self.profile).await?;
        info!("clic sur le bouton final '{}'", target.name);
        let opened =
            click_element(self.driver, &button, self.click_opts(t.final_new_window())).await?;
        self.settle_navigation(opened).await;
        // Délai de stabilisation: les scripts du site finissent leur travail
        // avant l'interaction suivante.
        tokio::time::sleep(target.settle()).await;
        self.driver.enter_default_frame().await?;
        Ok(())
    }

    async fn click_post_download_link(&self) -> Result<String, StageError> {
        let t = &self.profile.timeouts;
        self.driver.enter_default_frame().await?;
        defense::sweep_overlays(self.driver).await?;

        info!("attente du lien post-téléchargement");
        let locator = Locator::xpath(self.profile.post_download_link_xpath.clone());
        let budget = RetryBudget::single(t.post_link(), t.poll_interval());
        let link = wait_for_clickable(self.driver, &locator, budget, || async move {
            let _ = defense::sweep_overlays(self.driver).await;
        })
        .await?;

        info!("clic sur le lien post-téléchargement");
        let opened = click_element(self.driver, &link, self.click_opts(t.new_window())).await?;
        self.settle_navigation(opened).await;
        self.driver.enter_default_frame().await?;

        let url = self.driver.current_url().await?;
        info!("tunnel achevé, URL finale: {url}");
        Ok(url)
    }
}

fn read_stdin_line() -> std::io::Result<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line)
}

/// Exécute le tunnel complet avec retentatives bornées.
///
/// Chaque tentative possède sa session: lancement, parcours, puis fermeture
/// forcée quoi qu'il arrive (les erreurs de fermeture sont avalées).
/// Succès: l'URL de premier niveau après le clic post-téléchargement.
/// Épuisement des tentatives: absence de résultat, jamais une panique ni une
/// erreur — c'est le signal d'échec normal pour l'appelant.
pub async fn run_automation<F>(
    factory: &F,
    profile: &SiteProfile,
    request: &FunnelRequest,
) -> Option<String>
where
    F: DriverFactory,
{
    let download_page_url = request
        .download_page_url
        .clone()
        .unwrap_or_else(|| profile.download_page_url(&request.base_url, &request.video_id));

    for attempt in 1..=profile.max_retries {
        info!("=== tentative {attempt}/{} ===", profile.max_retries);
        let driver = match factory.launch().await {
            Ok(driver) => driver,
            Err(err) => {
                warn!("lancement de la session impossible: {err}");
                continue;
            }
        };

        let funnel = Funnel {
            driver: &driver,
            profile,
            request,
            download_page_url: &download_page_url,
        };
        let outcome = funnel.run().await;

        if driver.quit().await.is_err() {
            debug!("erreur de fermeture de session ignorée");
        }

        match outcome {
            Ok(url) => return Some(url),
            Err(StageError::Quality(err)) => {
                error!("{err}");
                return None;
            }
            Err(err) => warn!("échec de la tentative {attempt}: {err}"),
        }
    }

    error!("abandon après {} tentatives", profile.max_retries);
    None
}
