//! Abstraction du moteur navigateur.
//!
//! L'orchestrateur ne parle jamais directement à un moteur concret: il passe
//! par le trait [`Driver`], volontairement étroit (navigation, recherche
//! d'éléments, exécution de script, fenêtres et frames). Cela permet de
//! substituer un moteur simulé dans les tests et de confiner les détails
//! WebDriver dans `webdriver.rs`.
use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Stratégie de localisation d'un élément dans le document courant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Css,
    XPath,
}

/// Un couple (stratégie, sélecteur) identifiant un emplacement à inspecter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Locator {
    pub strategy: Strategy,
    pub selector: String,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self { strategy: Strategy::Css, selector: selector.into() }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self { strategy: Strategy::XPath, selector: selector.into() }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strategy {
            Strategy::Css => write!(f, "css:{}", self.selector),
            Strategy::XPath => write!(f, "xpath:{}", self.selector),
        }
    }
}

/// Alternatives équivalentes pour trouver un même élément logique;
/// la première qui répond gagne.
pub type LocatorSpec = Vec<Locator>;

/// Taxonomie d'erreurs du pilote.
///
/// `Timeout` couvre l'absence structurelle (budget de tentatives épuisé);
/// `Intercepted` et `Stale` servent au repli du clic; tout le reste est
/// fatal pour la session en cours.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("élément introuvable: {0}")]
    NotFound(String),
    #[error("élément obsolète: {0}")]
    Stale(String),
    #[error("clic intercepté: {0}")]
    Intercepted(String),
    #[error("délai dépassé: {0}")]
    Timeout(String),
    #[error("session navigateur: {0}")]
    Session(String),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout(_))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Poignée d'élément vivant dans le document courant.
///
/// Les poignées sont éphémères: toute navigation peut les invalider
/// (`DriverError::Stale`).
#[async_trait]
pub trait Element: Clone + Send + Sync {
    async fn click(&self) -> DriverResult<()>;
    async fn is_clickable(&self) -> DriverResult<bool>;
    async fn attr(&self, name: &str) -> DriverResult<Option<String>>;
    async fn text(&self) -> DriverResult<String>;
}

/// Interface étroite du moteur navigateur.
///
/// Une implémentation possède exactement un document de premier niveau et un
/// pointeur de focus (document par défaut ou frame). Tous les appels sont
/// séquentiels: aucun composant ne partage une session.
#[async_trait]
pub trait Driver: Send + Sync {
    type Elem: Element;
    type Window: Clone + PartialEq + Send + Sync + fmt::Debug;

    async fn navigate(&self, url: &str) -> DriverResult<()>;
    async fn current_url(&self) -> DriverResult<String>;
    async fn ready_state(&self) -> DriverResult<String>;
    async fn find(&self, locator: &Locator) -> DriverResult<Self::Elem>;
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Elem>>;
    /// Exécute un script dans le contexte de focus courant.
    async fn execute(&self, script: &str, args: Vec<Value>) -> DriverResult<Value>;
    /// Exécute un script dont `arguments[0]` est l'élément donné.
    async fn execute_on(&self, script: &str, target: &Self::Elem) -> DriverResult<()>;
    async fn windows(&self) -> DriverResult<Vec<Self::Window>>;
    async fn switch_to_window(&self, window: &Self::Window) -> DriverResult<()>;
    async fn enter_frame(&self, frame: &Self::Elem) -> DriverResult<()>;
    async fn enter_default_frame(&self) -> DriverResult<()>;
    /// Fermeture forcée de la session. Les appels suivants échoueront.
    async fn quit(&self) -> DriverResult<()>;
}

/// Fabrique de sessions: l'orchestrateur redémarre la session entière à
/// chaque tentative, jamais de reprise partielle.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Driver: Driver;

    async fn launch(&self) -> DriverResult<Self::Driver>;
}
