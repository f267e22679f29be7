//! Implémentation WebDriver du moteur navigateur, via chromedriver.
//!
//! Assemble les capacités Chrome/Brave (profil, préférences, images
//! coupées), pré-injecte le verrouillage des popups sur chaque nouveau
//! document et pousse la liste des motifs bloqués au niveau réseau, le tout
//! avant la première navigation. Les échecs de configuration CDP sont
//! signalés mais tolérés: la défense DOM prend le relais.
use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use thirtyfour::error::{WebDriverError, WebDriverErrorInner};
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::{ChromeCapabilities, WindowHandle};
use tracing::{info, warn};

use crate::browser::brave;
use crate::browser::defense;
use crate::browser::driver::{
    Driver, DriverError, DriverFactory, DriverResult, Element, Locator, Strategy,
};
use crate::config::SiteProfile;

/// Navigateur à piloter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BrowserKind {
    Chrome,
    Brave,
}

impl From<WebDriverError> for DriverError {
    fn from(err: WebDriverError) -> Self {
        let message = err.to_string();
        match err.into_inner() {
            WebDriverErrorInner::NoSuchElement(info) => DriverError::NotFound(format!("{info:?}")),
            WebDriverErrorInner::StaleElementReference(info) => {
                DriverError::Stale(format!("{info:?}"))
            }
            WebDriverErrorInner::ElementClickIntercepted(info) => {
                DriverError::Intercepted(format!("{info:?}"))
            }
            _ => DriverError::Session(message),
        }
    }
}

fn to_by(locator: &Locator) -> By {
    match locator.strategy {
        Strategy::Css => By::Css(locator.selector.clone()),
        Strategy::XPath => By::XPath(locator.selector.clone()),
    }
}

/// Session WebDriver vivante. Le profil temporaire éventuel vit aussi
/// longtemps que la session.
pub struct WdSession {
    driver: WebDriver,
    _profile_dir: Option<TempDir>,
}

#[async_trait]
impl Element for WebElement {
    async fn click(&self) -> DriverResult<()> {
        WebElement::click(self).await.map_err(Into::into)
    }

    async fn is_clickable(&self) -> DriverResult<bool> {
        WebElement::is_clickable(self).await.map_err(Into::into)
    }

    async fn attr(&self, name: &str) -> DriverResult<Option<String>> {
        WebElement::attr(self, name).await.map_err(Into::into)
    }

    async fn text(&self) -> DriverResult<String> {
        WebElement::text(self).await.map_err(Into::into)
    }
}

#[async_trait]
impl Driver for WdSession {
    type Elem = WebElement;
    type Window = WindowHandle;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.driver.goto(url).await.map_err(Into::into)
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.driver.current_url().await.map_err(DriverError::from)?.to_string())
    }

    async fn ready_state(&self) -> DriverResult<String> {
        let ret = self
            .driver
            .execute("return document.readyState;", Vec::new())
            .await
            .map_err(DriverError::from)?;
        Ok(ret.json().as_str().unwrap_or_default().to_string())
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Self::Elem> {
        self.driver.find(to_by(locator)).await.map_err(Into::into)
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Elem>> {
        self.driver.find_all(to_by(locator)).await.map_err(Into::into)
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        let ret = self.driver.execute(script, args).await.map_err(DriverError::from)?;
        Ok(ret.json().clone())
    }

    async fn execute_on(&self, script: &str, target: &Self::Elem) -> DriverResult<()> {
        let handle = target.to_json().map_err(DriverError::from)?;
        self.driver.execute(script, vec![handle]).await.map_err(DriverError::from)?;
        Ok(())
    }

    async fn windows(&self) -> DriverResult<Vec<Self::Window>> {
        self.driver.windows().await.map_err(Into::into)
    }

    async fn switch_to_window(&self, window: &Self::Window) -> DriverResult<()> {
        self.driver.switch_to_window(window.clone()).await.map_err(Into::into)
    }

    async fn enter_frame(&self, frame: &Self::Elem) -> DriverResult<()> {
        frame.clone().enter_frame().await.map_err(Into::into)
    }

    async fn enter_default_frame(&self) -> DriverResult<()> {
        self.driver.enter_default_frame().await.map_err(Into::into)
    }

    async fn quit(&self) -> DriverResult<()> {
        self.driver.clone().quit().await.map_err(Into::into)
    }
}

/// Fabrique de sessions WebDriver: une session neuve et durcie par appel.
pub struct WebDriverFactory {
    webdriver_url: String,
    browser: BrowserKind,
    blocked_url_patterns: Vec<String>,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: impl Into<String>, browser: BrowserKind, profile: &SiteProfile) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            browser,
            blocked_url_patterns: profile.blocked_url_patterns.clone(),
        }
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    type Driver = WdSession;

    async fn launch(&self) -> DriverResult<WdSession> {
        let (caps, profile_dir) = build_capabilities(self.browser)?;
        info!("lancement d'une session navigateur via {}", self.webdriver_url);
        let driver = WebDriver::new(&self.webdriver_url, caps).await.map_err(DriverError::from)?;
        harden(&driver, &self.blocked_url_patterns).await;
        Ok(WdSession { driver, _profile_dir: profile_dir })
    }
}

/// Options communes: fenêtre maximisée, pas de premier lancement, pas de
/// notifications ni d'extensions, images coupées côté Blink et côté profil.
fn build_capabilities(browser: BrowserKind) -> DriverResult<(ChromeCapabilities, Option<TempDir>)> {
    let mut caps = DesiredCapabilities::chrome();
    for arg in [
        "--start-maximized",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-notifications",
        "--disable-extensions",
        "--blink-settings=imagesEnabled=false",
    ] {
        caps.add_arg(arg)?;
    }
    caps.add_experimental_option(
        "prefs",
        json!({
            "download.prompt_for_download": false,
            "download.directory_upgrade": true,
            "safebrowsing.enabled": true,
            "profile.default_content_setting_values.popups": 2,
            "profile.managed_default_content_settings.popups": 2,
            "profile.managed_default_content_settings.images": 2,
            "profile.default_content_setting_values.notifications": 2,
            "profile.managed_default_content_settings.notifications": 2,
            "profile.default_content_setting_values.sound": 2,
        }),
    )?;

    if browser == BrowserKind::Brave {
        if let Some(binary) = brave::locate_binary() {
            if let Some(user_data) = brave::locate_user_data_dir() {
                brave::ensure_shields_aggressive(&user_data.join("Default").join("Preferences"));
                caps.add_arg(&format!("--user-data-dir={}", user_data.display()))?;
                caps.add_arg("--profile-directory=Default")?;
            } else {
                warn!("répertoire de données Brave introuvable, profil du pilote utilisé");
            }
            caps.add_arg("--disable-background-networking")?;
            caps.set_binary(&binary.to_string_lossy())?;
            return Ok((caps, None));
        }
        warn!("Brave introuvable, repli sur Chrome");
    }

    // Chrome: profil temporaire jetable, isolé des autres sessions.
    let dir = TempDir::new().map_err(|err| DriverError::Session(format!("profil temporaire: {err}")))?;
    caps.add_arg(&format!("--user-data-dir={}", dir.path().display()))?;
    Ok((caps, Some(dir)))
}

/// Durcissement d'une session neuve: pré-injection du verrouillage des
/// popups et blocage réseau des régies, avant toute navigation.
async fn harden(driver: &WebDriver, blocked: &[String]) {
    let tools = ChromeDevTools::new(driver.handle.clone());

    if let Err(err) = tools
        .execute_cdp_with_params(
            "Page.addScriptToEvaluateOnNewDocument",
            json!({ "source": defense::POPUP_LOCK_JS }),
        )
        .await
    {
        warn!("pré-injection du verrouillage impossible: {err}");
    }
    if let Err(err) = driver.execute(defense::POPUP_LOCK_JS, Vec::new()).await {
        warn!("verrouillage du document initial impossible: {err}");
    }

    let outcome = async {
        tools.execute_cdp("Network.enable").await?;
        tools
            .execute_cdp_with_params("Network.setBlockedURLs", json!({ "urls": blocked }))
            .await
    }
    .await;
    if let Err(err) = outcome {
        warn!("blocage réseau non configuré: {err}");
    }
}
