//! Moteur simulé pour les tests: pages, frames et fenêtres scriptés.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::driver::{
    Driver, DriverError, DriverFactory, DriverResult, Element, Locator, Strategy,
};

type ElementKey = (Option<String>, String);

#[derive(Debug, Default)]
struct Registry {
    /// Éléments visibles après un certain nombre de recherches du sélecteur.
    items: Vec<(usize, FakeElement)>,
    accesses: usize,
}

#[derive(Debug, Default)]
struct State {
    url: String,
    navigations: Vec<String>,
    executed: Vec<String>,
    clicks: Vec<String>,
    windows: Vec<String>,
    current_window: String,
    frame: Option<String>,
    entered_frames: Vec<String>,
    elements: HashMap<ElementKey, Registry>,
    frames: Vec<FakeElement>,
    fail_navigate: bool,
    quits: usize,
}

/// Élément scripté; les effets de clic (ouverture de fenêtre, navigation)
/// s'appliquent à l'état partagé du [`FakeDriver`] qui l'a enregistré.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    key: String,
    is_clickable: bool,
    text: String,
    attrs: HashMap<String, String>,
    intercept_first: bool,
    always_stale: bool,
    opens: Option<String>,
    navigates_to: Option<String>,
    refuses_entry: bool,
    intercept_spent: Arc<Mutex<bool>>,
    shared: Option<Arc<Mutex<State>>>,
}

impl FakeElement {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn clickable(mut self, yes: bool) -> Self {
        self.is_clickable = yes;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn opens_window(mut self, handle: impl Into<String>) -> Self {
        self.opens = Some(handle.into());
        self
    }

    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }

    pub fn intercept_first_click(mut self) -> Self {
        self.intercept_first = true;
        self
    }

    pub fn always_stale(mut self) -> Self {
        self.always_stale = true;
        self
    }

    pub fn refuse_entry(mut self) -> Self {
        self.refuses_entry = true;
        self
    }

    fn apply_click_effects(&self) {
        if let Some(shared) = &self.shared {
            let mut state = shared.lock().unwrap();
            state.clicks.push(self.key.clone());
            if let Some(handle) = &self.opens {
                state.windows.push(handle.clone());
            }
            if let Some(url) = &self.navigates_to {
                state.url = url.clone();
            }
        }
    }

    fn script_click(&self) -> DriverResult<()> {
        if self.always_stale {
            return Err(DriverError::Stale(format!("poignée périmée: {}", self.key)));
        }
        self.apply_click_effects();
        Ok(())
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn click(&self) -> DriverResult<()> {
        if self.always_stale {
            return Err(DriverError::Stale(format!("poignée périmée: {}", self.key)));
        }
        if self.intercept_first {
            let mut spent = self.intercept_spent.lock().unwrap();
            if !*spent {
                *spent = true;
                return Err(DriverError::Intercepted("superposition au-dessus de la cible".into()));
            }
        }
        self.apply_click_effects();
        Ok(())
    }

    async fn is_clickable(&self) -> DriverResult<bool> {
        Ok(self.is_clickable)
    }

    async fn attr(&self, name: &str) -> DriverResult<Option<String>> {
        Ok(self.attrs.get(name).cloned())
    }

    async fn text(&self) -> DriverResult<String> {
        Ok(self.text.clone())
    }
}

/// Moteur simulé. Fenêtre initiale: `fenetre-1`.
#[derive(Clone)]
pub struct FakeDriver {
    state: Arc<Mutex<State>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        let state = State {
            current_window: "fenetre-1".into(),
            windows: vec!["fenetre-1".into()],
            ..State::default()
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn attach(&self, mut element: FakeElement) -> FakeElement {
        element.shared = Some(self.state.clone());
        element
    }

    /// Enregistre un élément sans le rattacher à un sélecteur.
    pub fn register(&self, element: FakeElement) -> FakeElement {
        self.attach(element)
    }

    pub fn add_element(&self, selector: &str, element: FakeElement) {
        self.add_element_after(selector, element, 0);
    }

    /// L'élément ne devient visible qu'après `after` recherches du sélecteur.
    pub fn add_element_after(&self, selector: &str, element: FakeElement, after: usize) {
        let element = self.attach(element);
        let mut state = self.state.lock().unwrap();
        let key = (state.frame.clone(), selector.to_string());
        state.elements.entry(key).or_default().items.push((after, element));
    }

    pub fn add_frame(&self, frame: FakeElement) {
        let frame = self.attach(frame);
        self.state.lock().unwrap().frames.push(frame);
    }

    pub fn add_frame_element(&self, frame_key: &str, selector: &str, element: FakeElement) {
        let element = self.attach(element);
        let mut state = self.state.lock().unwrap();
        let key = (Some(frame_key.to_string()), selector.to_string());
        state.elements.entry(key).or_default().items.push((0, element));
    }

    pub fn fail_navigations(&self) {
        self.state.lock().unwrap().fail_navigate = true;
    }

    pub fn executed_count(&self, script: &str) -> usize {
        self.state.lock().unwrap().executed.iter().filter(|s| s.as_str() == script).count()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn current_window(&self) -> String {
        self.state.lock().unwrap().current_window.clone()
    }

    pub fn current_frame(&self) -> Option<String> {
        self.state.lock().unwrap().frame.clone()
    }

    pub fn entered_frames(&self) -> Vec<String> {
        self.state.lock().unwrap().entered_frames.clone()
    }

    pub fn quits(&self) -> usize {
        self.state.lock().unwrap().quits
    }

    fn lookup(&self, locator: &Locator) -> Vec<FakeElement> {
        let mut state = self.state.lock().unwrap();
        let key = (state.frame.clone(), locator.selector.clone());
        match state.elements.get_mut(&key) {
            Some(registry) => {
                registry.accesses += 1;
                let seen = registry.accesses;
                registry
                    .items
                    .iter()
                    .filter(|(after, _)| *after < seen)
                    .map(|(_, el)| el.clone())
                    .collect()
            }
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Elem = FakeElement;
    type Window = String;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_navigate {
            return Err(DriverError::Session("navigation refusée".into()));
        }
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        state.frame = None;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn ready_state(&self) -> DriverResult<String> {
        Ok("complete".into())
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Self::Elem> {
        self.lookup(locator)
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::NotFound(locator.to_string()))
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Elem>> {
        if locator.strategy == Strategy::Css && locator.selector == "iframe" {
            let state = self.state.lock().unwrap();
            if state.frame.is_none() {
                return Ok(state.frames.clone());
            }
            return Ok(Vec::new());
        }
        Ok(self.lookup(locator))
    }

    async fn execute(&self, script: &str, _args: Vec<Value>) -> DriverResult<Value> {
        self.state.lock().unwrap().executed.push(script.to_string());
        Ok(Value::Null)
    }

    async fn execute_on(&self, script: &str, target: &Self::Elem) -> DriverResult<()> {
        self.state.lock().unwrap().executed.push(script.to_string());
        if script.contains(".click()") {
            target.script_click()?;
        }
        Ok(())
    }

    async fn windows(&self) -> DriverResult<Vec<Self::Window>> {
        Ok(self.state.lock().unwrap().windows.clone())
    }

    async fn switch_to_window(&self, window: &Self::Window) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.windows.contains(window) {
            return Err(DriverError::Session(format!("fenêtre inconnue: {window}")));
        }
        state.current_window = window.clone();
        state.frame = None;
        Ok(())
    }

    async fn enter_frame(&self, frame: &Self::Elem) -> DriverResult<()> {
        if frame.refuses_entry {
            return Err(DriverError::Session(format!("frame refusée: {}", frame.key)));
        }
        let mut state = self.state.lock().unwrap();
        state.frame = Some(frame.key.clone());
        state.entered_frames.push(frame.key.clone());
        Ok(())
    }

    async fn enter_default_frame(&self) -> DriverResult<()> {
        self.state.lock().unwrap().frame = None;
        Ok(())
    }

    async fn quit(&self) -> DriverResult<()> {
        self.state.lock().unwrap().quits += 1;
        Ok(())
    }
}

/// Fabrique rendant des moteurs préparés par une fermeture, en comptant
/// les lancements.
pub struct FakeFactory<F: Fn() -> FakeDriver + Send + Sync> {
    build: F,
    launches: Mutex<u32>,
}

impl<F: Fn() -> FakeDriver + Send + Sync> FakeFactory<F> {
    pub fn new(build: F) -> Self {
        Self { build, launches: Mutex::new(0) }
    }

    pub fn launches(&self) -> u32 {
        *self.launches.lock().unwrap()
    }
}

#[async_trait]
impl<F: Fn() -> FakeDriver + Send + Sync> DriverFactory for FakeFactory<F> {
    type Driver = FakeDriver;

    async fn launch(&self) -> DriverResult<FakeDriver> {
        *self.launches.lock().unwrap() += 1;
        Ok((self.build)())
    }
}
