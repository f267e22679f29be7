//! Découverte des liens saison → épisode → serveur d'une série.
//!
//! Couche purement HTTP + DOM, en amont du tunnel navigateur: elle fournit
//! un nom de serveur et son lien; le tunnel n'est sollicité que pour le
//! serveur pris en charge par l'automatisation. La liste des serveurs
//! n'apparaît qu'après un POST `View=1` sur la même session (cookies).
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

/// Lien d'un serveur de téléchargement retenu pour un épisode.
#[derive(Debug, Clone)]
pub struct ServerLink {
    pub server: String,
    pub href: String,
}

/// Scraper de la structure d'une série.
pub struct SeriesScraper {
    client: Client,
    // Limite les requêtes concurrentes pour ne pas surcharger le serveur.
    semaphore: Arc<Semaphore>,
    wanted_servers: Vec<String>,
}

impl SeriesScraper {
    pub fn new(wanted_servers: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .cookie_store(true)
            .build()
            .context("construction du client HTTP")?;
        let semaphore = Arc::new(Semaphore::new(10));
        Ok(Self { client, semaphore, wanted_servers })
    }

    /// Liens de saisons de la page principale, dédupliqués dans l'ordre.
    pub async fn season_links(&self, series_url: &str) -> Result<Vec<String>> {
        let html = self.fetch_page(series_url).await?;
        let links = parse_season_links(&html, series_url)?;
        info!("{} saisons trouvées", links.len());
        Ok(links)
    }

    pub async fn episode_links(&self, season_url: &str) -> Result<Vec<String>> {
        let html = self.fetch_page(season_url).await?;
        let links = parse_episode_links(&html, season_url)?;
        info!("{} épisodes trouvés pour {season_url}", links.len());
        Ok(links)
    }

    /// Épisodes de plusieurs saisons, récupérés en parallèle borné,
    /// dans l'ordre des saisons données.
    pub async fn episodes_for_seasons(&self, season_urls: &[String]) -> Vec<(String, Vec<String>)> {
        stream::iter(season_urls.to_vec())
            .map(|url| async move {
                let episodes = self.episode_links(&url).await.unwrap_or_else(|err| {
                    warn!("échec du scraping de {url}: {err:#}");
                    Vec::new()
                });
                (url, episodes)
            })
            .buffered(5)
            .collect()
            .await
    }

    /// Premier serveur voulu proposé pour un épisode, avec son lien.
    ///
    /// Le GET initial amorce la session; la liste ne sort qu'en réponse au
    /// POST `View=1`.
    pub async fn server_link(&self, episode_url: &str) -> Result<Option<ServerLink>> {
        let _permit = self.semaphore.acquire().await.context("acquisition du sémaphore")?;

        let response = self
            .client
            .get(episode_url)
            .send()
            .await
            .with_context(|| format!("GET {episode_url}"))?;
        if !response.status().is_success() {
            bail!("erreur HTTP {} sur {episode_url}", response.status());
        }
        let _ = response.text().await;

        let posted = self
            .client
            .post(episode_url)
            .form(&[("View", "1")])
            .send()
            .await
            .with_context(|| format!("POST View=1 {episode_url}"))?;
        if !posted.status().is_success() {
            bail!("erreur HTTP {} sur le POST {episode_url}", posted.status());
        }
        let html = posted.text().await.context("lecture de la page des serveurs")?;

        parse_server_link(&html, &self.wanted_servers)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let _permit = self.semaphore.acquire().await.context("acquisition du sémaphore")?;
        debug!("récupération de la page: {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if !response.status().is_success() {
            bail!("erreur HTTP {} sur {url}", response.status());
        }
        response.text().await.context("lecture du corps de la réponse")
    }
}

/// Décompose un lien serveur en {URL de base, identifiant vidéo}.
pub fn split_server_link(link: &str) -> Result<(String, String)> {
    let parsed = Url::parse(link).with_context(|| format!("lien serveur invalide: {link}"))?;
    let host = parsed.host_str().with_context(|| format!("hôte absent du lien: {link}"))?;
    let base = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    };
    let video_id = parsed.path().trim_matches('/').to_string();
    if video_id.is_empty() {
        bail!("identifiant vidéo absent du lien: {link}");
    }
    Ok((base, video_id))
}

fn parse_season_links(html: &str, page_url: &str) -> Result<Vec<String>> {
    collect_links(html, page_url, "li.movieItem a", "/season/")
}

fn parse_episode_links(html: &str, page_url: &str) -> Result<Vec<String>> {
    collect_links(html, page_url, ".EpsList li a", "/episode/")
}

fn collect_links(html: &str, page_url: &str, selector: &str, fragment: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(selector)
        .map_err(|err| anyhow::anyhow!("sélecteur invalide: {err}"))?;
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else { continue };
        if !href.contains(fragment) {
            continue;
        }
        let absolute = resolve_href(page_url, href)?;
        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }
    Ok(links)
}

fn parse_server_link(html: &str, wanted: &[String]) -> Result<Option<ServerLink>> {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse("ul.donwload-servers-list li")
        .map_err(|err| anyhow::anyhow!("sélecteur des serveurs: {err}"))?;
    let name_selector = Selector::parse("span.ser-name")
        .map_err(|err| anyhow::anyhow!("sélecteur du nom de serveur: {err}"))?;
    let link_selector = Selector::parse("a.ser-link")
        .map_err(|err| anyhow::anyhow!("sélecteur du lien de serveur: {err}"))?;

    for item in document.select(&item_selector) {
        let Some(name_element) = item.select(&name_selector).next() else { continue };
        let name = name_element.text().collect::<String>().trim().to_string();
        debug!("serveur proposé: {name}");
        if !wanted.iter().any(|w| w == &name) {
            continue;
        }
        if let Some(anchor) = item.select(&link_selector).next() {
            if let Some(href) = anchor.value().attr("href") {
                info!("serveur retenu: {name}");
                return Ok(Some(ServerLink { server: name, href: href.to_string() }));
            }
        }
    }
    Ok(None)
}

/// Résout un href relatif contre l'URL de la page qui le porte.
fn resolve_href(page_url: &str, href: &str) -> Result<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Ok(href.to_string());
    }
    let base = Url::parse(page_url).context("URL de page invalide")?;
    let resolved = base.join(href).context("résolution du href relatif")?;
    Ok(resolved.to_string())
}
