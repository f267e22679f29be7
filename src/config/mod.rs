//! Profil de site injecté à la construction.
//!
//! Tout ce qui est propre au site cible vit ici: motifs d'URL bloqués,
//! table des variantes du bouton final, préréglages de qualité, gabarits de
//! sélecteurs et table des délais. Le profil par défaut décrit le site
//! observé; un autre habillage se prend en charge en substituant un fichier
//! TOML via `--profile`, jamais en touchant au code.
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::browser::driver::{Locator, LocatorSpec};

/// Une variante connue du contrôle «téléchargement final» à travers les
/// révisions du site, avec son délai de stabilisation post-clic.
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonTarget {
    pub name: String,
    pub locators: LocatorSpec,
    pub settle_secs: f64,
}

impl ButtonTarget {
    pub fn settle(&self) -> Duration {
        Duration::from_secs_f64(self.settle_secs)
    }
}

/// Table des délais, en secondes côté configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub page_ready_secs: f64,
    /// Attente de chargement après l'ouverture d'une nouvelle fenêtre.
    pub page_ready_window_secs: f64,
    /// Attente raccourcie quand la navigation reste dans la même fenêtre.
    pub page_ready_short_secs: f64,
    pub url_confirm_secs: f64,
    pub download_button_secs: f64,
    pub quality_collect_secs: f64,
    pub final_button_deadline_secs: f64,
    /// Une tentative courte par localisateur pendant le balayage des frames.
    pub frame_attempt_secs: f64,
    pub post_link_secs: f64,
    pub new_window_secs: f64,
    pub final_new_window_secs: f64,
    pub classic_button_secs: f64,
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_ready_secs: 20.0,
            page_ready_window_secs: 10.0,
            page_ready_short_secs: 5.0,
            url_confirm_secs: 5.0,
            download_button_secs: 20.0,
            quality_collect_secs: 20.0,
            final_button_deadline_secs: 20.0,
            frame_attempt_secs: 1.0,
            post_link_secs: 15.0,
            new_window_secs: 1.0,
            final_new_window_secs: 2.0,
            classic_button_secs: 30.0,
            poll_interval_ms: 250,
        }
    }
}

impl Timeouts {
    pub fn page_ready(&self) -> Duration { Duration::from_secs_f64(self.page_ready_secs) }
    pub fn page_ready_window(&self) -> Duration { Duration::from_secs_f64(self.page_ready_window_secs) }
    pub fn page_ready_short(&self) -> Duration { Duration::from_secs_f64(self.page_ready_short_secs) }
    pub fn url_confirm(&self) -> Duration { Duration::from_secs_f64(self.url_confirm_secs) }
    pub fn download_button(&self) -> Duration { Duration::from_secs_f64(self.download_button_secs) }
    pub fn quality_collect(&self) -> Duration { Duration::from_secs_f64(self.quality_collect_secs) }
    pub fn final_button_deadline(&self) -> Duration { Duration::from_secs_f64(self.final_button_deadline_secs) }
    pub fn frame_attempt(&self) -> Duration { Duration::from_secs_f64(self.frame_attempt_secs) }
    pub fn post_link(&self) -> Duration { Duration::from_secs_f64(self.post_link_secs) }
    pub fn new_window(&self) -> Duration { Duration::from_secs_f64(self.new_window_secs) }
    pub fn final_new_window(&self) -> Duration { Duration::from_secs_f64(self.final_new_window_secs) }
    pub fn classic_button(&self) -> Duration { Duration::from_secs_f64(self.classic_button_secs) }
    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}

/// Constantes propres au site, immuables après construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Motifs glob bloqués au niveau réseau avant toute navigation.
    pub blocked_url_patterns: Vec<String>,
    /// Variantes du bouton de téléchargement final, essayées dans l'ordre.
    pub button_targets: Vec<ButtonTarget>,
    /// Alias familiers vers les libellés canoniques de qualité.
    pub quality_presets: BTreeMap<String, String>,
    /// Jeton repéré dans l'id ou le nom d'une iframe pour la prioriser.
    pub frame_hint: String,
    /// Lien «Download» sur la page vidéo.
    pub download_link_xpath: String,
    /// Lien affiché une fois le téléchargement déclenché.
    pub post_download_link_xpath: String,
    /// Fragment de href identifiant les liens de qualité d'une vidéo,
    /// `{id}` étant remplacé par l'identifiant.
    pub quality_href_template: String,
    /// Gabarits d'URL des deux pages du tunnel.
    pub video_path_template: String,
    pub download_path_template: String,
    /// Nom du serveur pris en charge par l'automatisation navigateur.
    pub automation_server: String,
    /// Boutons connus des serveurs classiques (résolution directe).
    pub classic_button_locators: LocatorSpec,
    pub classic_submit_locator: Locator,
    /// Tentatives complètes du tunnel, session redémarrée entre chacune.
    pub max_retries: u32,
    /// Retenter une fois le clic par script quand la poignée est encore
    /// obsolète, au lieu de propager.
    pub retry_stale_script_click: bool,
    pub timeouts: Timeouts,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            blocked_url_patterns: [
                "*://*/*.jpg",
                "*://*/*.jpeg",
                "*://*/*.png",
                "*://*/*.gif",
                "*://*/*.bmp",
                "*://*/*.svg",
                "*://*/*.webp",
                "*://*.doubleclick.net/*",
                "*://*.googlesyndication.com/*",
                "*://*.googletagservices.com/*",
                "*://*.googletagmanager.com/*",
                "*://*.adnxs.com/*",
                "*://*.taboola.com/*",
                "*://*.outbrain.com/*",
                "*://*.zedo.com/*",
                "*://*.revcontent.com/*",
                "*://*.adsafeprotected.com/*",
                "*://*.moatads.com/*",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            button_targets: vec![
                ButtonTarget {
                    name: "bouton principal du conteneur F1".into(),
                    locators: vec![
                        Locator::xpath("//*[@id='F1']/button"),
                        Locator::xpath("//div[@id='F1']//button"),
                    ],
                    settle_secs: 2.0,
                },
                ButtonTarget {
                    name: "variante submit".into(),
                    locators: vec![
                        Locator::css("button.submit-btn"),
                        Locator::css("a.submit-btn"),
                        Locator::xpath("//button[contains(@class,'submit-btn')]"),
                    ],
                    settle_secs: 1.5,
                },
                ButtonTarget {
                    name: "repli bouton F1".into(),
                    locators: vec![
                        Locator::css("#F1 button"),
                        Locator::xpath("//button[@id='F1']"),
                    ],
                    settle_secs: 1.0,
                },
            ],
            quality_presets: BTreeMap::from([
                ("4k".into(), "4K quality".into()),
                ("fullhd".into(), "Full HD quality".into()),
                ("hd".into(), "HD quality".into()),
            ]),
            frame_hint: "f1".into(),
            download_link_xpath: "//a[contains(@href, '/f/') and contains(translate(normalize-space(.), \
                 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz'), 'download')]"
                .into(),
            post_download_link_xpath: "/html/body/main/div/section/div/div[1]/div/a".into(),
            quality_href_template: "/f/{id}_".into(),
            video_path_template: "/{id}".into(),
            download_path_template: "/f/{id}".into(),
            automation_server: "تحميل متعدد".into(),
            classic_button_locators: vec![
                Locator::css("a.btn.btn-gr.videoplayer-download"),
                Locator::css("button.download-btn"),
                Locator::xpath("//a[contains(@class, 'download')]"),
                Locator::xpath("//button[contains(@class, 'download')]"),
                Locator::xpath("//*[contains(text(), 'Download') or contains(text(), 'download')]"),
            ],
            classic_submit_locator: Locator::css("a.btn-gr.submit-btn"),
            max_retries: 3,
            retry_stale_script_click: false,
            timeouts: Timeouts::default(),
        }
    }
}

impl SiteProfile {
    /// Charge un profil TOML; les champs absents retombent sur le défaut.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("lecture du profil {}", path.display()))?;
        let profile = toml::from_str(&text)
            .with_context(|| format!("analyse du profil {}", path.display()))?;
        Ok(profile)
    }

    pub fn video_url(&self, base_url: &str, video_id: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.video_path_template.replace("{id}", video_id))
    }

    pub fn download_page_url(&self, base_url: &str, video_id: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.download_path_template.replace("{id}", video_id))
    }

    /// Localisateur des liens de qualité pour une vidéo donnée.
    pub fn quality_links_locator(&self, video_id: &str) -> Locator {
        let fragment = self.quality_href_template.replace("{id}", video_id);
        Locator::xpath(format!("//a[contains(@href, '{fragment}')]"))
    }

    /// Libellé canonique d'un alias de qualité, s'il existe.
    pub fn preset_label(&self, normalized_key: &str) -> Option<&str> {
        self.quality_presets.get(normalized_key).map(String::as_str)
    }
}
