//! Point d'entrée: journalisation, profil de site, puis aiguillage entre la
//! résolution d'une seule vidéo et le parcours d'une série complète.
mod browser;
mod cli;
mod config;
mod funnel;
mod scrapers;

use anyhow::bail;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::browser::driver::{Driver, DriverFactory};
use crate::browser::webdriver::{BrowserKind, WebDriverFactory};
use crate::cli::{Args, Command, RunArgs, SeriesArgs};
use crate::config::SiteProfile;
use crate::funnel::direct::resolve_classic;
use crate::funnel::{FunnelRequest, run_automation};
use crate::scrapers::series::{SeriesScraper, split_server_link};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let profile = match &args.profile {
        Some(path) => SiteProfile::from_path(path)?,
        None => SiteProfile::default(),
    };

    let Args { webdriver_url, browser, no_prompt, open, command, .. } = args;
    match command {
        Command::Run(run) => run_single(run, &profile, &webdriver_url, browser, no_prompt, open).await,
        Command::Series(series) => {
            run_series(series, &profile, &webdriver_url, browser, no_prompt, open).await
        }
    }
}

/// Résolution d'une seule vidéo: les champs manquants sont demandés
/// interactivement, ou refusés net avec `--no-prompt`.
async fn run_single(
    run: RunArgs,
    profile: &SiteProfile,
    webdriver_url: &str,
    browser: BrowserKind,
    no_prompt: bool,
    open: bool,
) -> anyhow::Result<()> {
    let base_url = cli::require(
        run.base_url,
        "URL de base (ex. https://cavanhabg.com): ",
        "--base-url",
        no_prompt,
    )?;
    let video_id = cli::require(
        run.video_id,
        "Identifiant de la vidéo (ex. oy2o53wfiw82): ",
        "--video-id",
        no_prompt,
    )?;
    info!("vidéo '{video_id}', qualité '{}', base '{base_url}'", run.quality);

    let factory = WebDriverFactory::new(webdriver_url, browser, profile);
    let request = FunnelRequest {
        video_id,
        quality_label: run.quality,
        allow_prompt: !no_prompt,
        require_quality_match: run.strict_quality,
        base_url,
        start_from_download: run.start_from_download,
        download_page_url: run.download_page_url,
    };

    match run_automation(&factory, profile, &request).await {
        Some(url) => {
            println!("{url}");
            maybe_open(open, &url);
            Ok(())
        }
        None => {
            error!("échec de l'automatisation du téléchargement");
            std::process::exit(1);
        }
    }
}

/// Parcours d'une série: découverte des saisons et épisodes, puis
/// résolution épisode par épisode via le tunnel ou le raccourci classique.
async fn run_series(
    series: SeriesArgs,
    profile: &SiteProfile,
    webdriver_url: &str,
    browser: BrowserKind,
    no_prompt: bool,
    open: bool,
) -> anyhow::Result<()> {
    let wanted = if series.servers.is_empty() {
        vec![profile.automation_server.clone()]
    } else {
        series.servers.clone()
    };
    let scraper = SeriesScraper::new(wanted)?;

    let seasons = scraper.season_links(&series.series_url).await?;
    if seasons.is_empty() {
        bail!("aucune saison trouvée sur {}", series.series_url);
    }
    let picked = cli::choose_indices("Saisons disponibles:", &seasons, no_prompt)?;
    let selected: Vec<String> = picked.iter().map(|&idx| seasons[idx].clone()).collect();

    let factory = WebDriverFactory::new(webdriver_url, browser, profile);
    let mut resolved = 0usize;

    for (season_url, mut episodes) in scraper.episodes_for_seasons(&selected).await {
        if episodes.is_empty() {
            warn!("aucun épisode pour la saison {season_url}");
            continue;
        }
        if selected.len() == 1 && !no_prompt {
            let answer = cli::prompt("Nombre d'épisodes à traiter (vide pour tous): ")?;
            if let Ok(count) = answer.parse::<usize>() {
                episodes.truncate(count);
            }
        }
        info!("saison {season_url}: {} épisodes", episodes.len());

        for (index, episode_url) in episodes.iter().enumerate() {
            info!("épisode {}/{}: {episode_url}", index + 1, episodes.len());
            let server = match scraper.server_link(episode_url).await {
                Ok(Some(server)) => server,
                Ok(None) => {
                    warn!("aucun serveur accepté pour {episode_url}");
                    continue;
                }
                Err(err) => {
                    warn!("liste des serveurs illisible pour {episode_url}: {err:#}");
                    continue;
                }
            };

            let final_url = if server.server == profile.automation_server {
                resolve_with_funnel(&factory, profile, &series, no_prompt, &server.href).await
            } else {
                resolve_with_classic(&factory, profile, &server.href).await
            };

            match final_url {
                Some(url) => {
                    println!("{episode_url} -> {url}");
                    maybe_open(open, &url);
                    resolved += 1;
                }
                None => warn!("pas de lien final pour {episode_url}"),
            }
        }
    }

    info!("{resolved} liens résolus");
    Ok(())
}

async fn resolve_with_funnel(
    factory: &WebDriverFactory,
    profile: &SiteProfile,
    series: &SeriesArgs,
    no_prompt: bool,
    server_href: &str,
) -> Option<String> {
    let (base_url, video_id) = match split_server_link(server_href) {
        Ok(parts) => parts,
        Err(err) => {
            warn!("lien serveur indécomposable: {err:#}");
            return None;
        }
    };
    let request = FunnelRequest {
        video_id,
        quality_label: series.quality.clone(),
        allow_prompt: !no_prompt,
        require_quality_match: series.strict_quality,
        base_url,
        start_from_download: false,
        download_page_url: None,
    };
    run_automation(factory, profile, &request).await
}

async fn resolve_with_classic(
    factory: &WebDriverFactory,
    profile: &SiteProfile,
    server_href: &str,
) -> Option<String> {
    let driver = match factory.launch().await {
        Ok(driver) => driver,
        Err(err) => {
            warn!("lancement de la session impossible: {err}");
            return None;
        }
    };
    let outcome = resolve_classic(&driver, profile, server_href).await;
    let _ = driver.quit().await;
    match outcome {
        Ok(found) => found,
        Err(err) => {
            warn!("résolution directe échouée: {err}");
            None
        }
    }
}

fn maybe_open(open: bool, url: &str) {
    if !open {
        return;
    }
    if let Err(err) = webbrowser::open(url) {
        warn!("ouverture du navigateur impossible: {err}");
    }
}
