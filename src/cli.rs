//! Ligne de commande et invites interactives.
use std::io::Write;
use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use crate::browser::webdriver::BrowserKind;

/// Récupère des liens de téléchargement directs en pilotant un vrai
/// navigateur à travers le tunnel publicitaire du site.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// URL du serveur WebDriver (chromedriver).
    #[arg(long, value_name = "URL", default_value = "http://localhost:9515", global = true)]
    pub webdriver_url: String,

    /// Navigateur à piloter.
    #[arg(long, value_enum, default_value = "chrome", global = true)]
    pub browser: BrowserKind,

    /// Profil de site TOML; défaut intégré sinon.
    #[arg(long, value_name = "FICHIER", global = true)]
    pub profile: Option<PathBuf>,

    /// Ne jamais poser de question; échouer si une information manque.
    #[arg(long, global = true)]
    pub no_prompt: bool,

    /// Ouvrir chaque URL résolue dans le navigateur par défaut.
    #[arg(long, global = true)]
    pub open: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Résout le lien direct d'une seule vidéo.
    Run(RunArgs),
    /// Parcourt une série entière: saisons, épisodes, serveurs.
    Series(SeriesArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Identifiant de la vidéo dans l'URL (ex. oy2o53wfiw82).
    #[arg(long)]
    pub video_id: Option<String>,

    /// Qualité souhaitée (ex. «Full HD», «HD», «4K»).
    #[arg(long, default_value = "Full HD")]
    pub quality: String,

    /// URL de base du site (ex. https://cavanhabg.com).
    #[arg(long)]
    pub base_url: Option<String>,

    /// Commencer directement sur la page de téléchargement.
    #[arg(long)]
    pub start_from_download: bool,

    /// URL directe de la page de téléchargement.
    #[arg(long)]
    pub download_page_url: Option<String>,

    /// Exiger une correspondance de qualité au lieu du repli silencieux
    /// sur la première option.
    #[arg(long)]
    pub strict_quality: bool,
}

#[derive(clap::Args, Debug)]
pub struct SeriesArgs {
    /// URL de la page principale de la série.
    pub series_url: String,

    /// Qualité souhaitée pour chaque épisode.
    #[arg(long, default_value = "Full HD")]
    pub quality: String,

    /// Serveur accepté (répétable); défaut: le serveur automatisé du profil.
    #[arg(long = "server", value_name = "NOM")]
    pub servers: Vec<String>,

    /// Exiger une correspondance de qualité au lieu du repli silencieux.
    #[arg(long)]
    pub strict_quality: bool,
}

/// Affiche `question` puis lit une ligne sur l'entrée standard.
pub fn prompt(question: &str) -> std::io::Result<String> {
    print!("{question}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Champ requis: valeur du drapeau si fournie, sinon invite interactive,
/// sinon erreur de configuration immédiate.
pub fn require(value: Option<String>, question: &str, flag: &str, no_prompt: bool) -> anyhow::Result<String> {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            return Ok(value.trim().to_string());
        }
    }
    if no_prompt {
        bail!("{flag} est requis avec --no-prompt");
    }
    let answer = prompt(question)?;
    if answer.is_empty() {
        bail!("{flag} ne peut pas être vide");
    }
    Ok(answer)
}

/// Choix multiple 1-based: numéros séparés par des virgules, ou «all».
/// Sans invite permise, tout est retenu.
pub fn choose_indices(title: &str, items: &[String], no_prompt: bool) -> anyhow::Result<Vec<usize>> {
    if no_prompt || items.len() == 1 {
        return Ok((0..items.len()).collect());
    }
    println!("{title}");
    for (idx, item) in items.iter().enumerate() {
        println!(" {}. {item}", idx + 1);
    }
    let answer = prompt("Numéros séparés par des virgules, ou «all»: ")?;
    if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
        return Ok((0..items.len()).collect());
    }
    let mut picked = Vec::new();
    for part in answer.split(',') {
        if let Ok(number) = part.trim().parse::<usize>() {
            if (1..=items.len()).contains(&number) && !picked.contains(&(number - 1)) {
                picked.push(number - 1);
            }
        }
    }
    if picked.is_empty() {
        bail!("aucune sélection valide dans «{answer}»");
    }
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn la_commande_run_se_parse_avec_ses_drapeaux() {
        let args = Args::try_parse_from([
            "funnels",
            "run",
            "--video-id",
            "oy2o53wfiw82",
            "--base-url",
            "https://cavanhabg.com",
            "--quality",
            "4K",
            "--start-from-download",
            "--no-prompt",
        ])
        .unwrap();
        assert!(args.no_prompt);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.video_id.as_deref(), Some("oy2o53wfiw82"));
                assert_eq!(run.quality, "4K");
                assert!(run.start_from_download);
                assert!(!run.strict_quality);
            }
            other => panic!("commande inattendue: {other:?}"),
        }
    }

    #[test]
    fn la_commande_series_accepte_plusieurs_serveurs() {
        let args = Args::try_parse_from([
            "funnels",
            "series",
            "https://site.example/serie/x",
            "--server",
            "تحميل متعدد",
            "--server",
            "Serveur B",
        ])
        .unwrap();
        match args.command {
            Command::Series(series) => {
                assert_eq!(series.servers.len(), 2);
                assert_eq!(series.series_url, "https://site.example/serie/x");
            }
            other => panic!("commande inattendue: {other:?}"),
        }
    }

    #[test]
    fn require_echoue_sans_valeur_en_mode_non_interactif() {
        let err = require(None, "? ", "--base-url", true).unwrap_err();
        assert!(err.to_string().contains("--base-url"));

        let ok = require(Some(" https://h ".into()), "? ", "--base-url", true).unwrap();
        assert_eq!(ok, "https://h");
    }

    #[test]
    fn choose_indices_retient_tout_sans_invite() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(choose_indices("t", &items, true).unwrap(), vec![0, 1]);
    }
}
