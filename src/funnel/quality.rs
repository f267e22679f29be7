//! Découverte et sélection des variantes de qualité.
//!
//! Les liens de qualité d'une vidéo partagent un fragment de href prévisible;
//! ils sont régulièrement recouverts par des publicités injectées, d'où le
//! balayage de défense à chaque sondage. Les libellés libres du site sont
//! normalisés (minuscules alphanumériques) pour une comparaison floue avec
//! la qualité demandée.
use std::io::Write;

use tracing::{info, warn};

use crate::browser::defense;
use crate::browser::driver::{Driver, DriverError, DriverResult, Element};
use crate::browser::wait::{Poll, poll_until};
use crate::config::SiteProfile;

/// Une variante de qualité découverte sur la page de téléchargement.
/// Valide uniquement le temps du chargement de page courant.
#[derive(Debug, Clone)]
pub struct QualityOption<E> {
    pub label: String,
    pub href: String,
    pub normalized: String,
    pub element: E,
}

#[derive(Debug, thiserror::Error)]
pub enum QualityError {
    #[error("aucune option ne correspond à la qualité exigée '{0}'")]
    NoMatch(String),
    #[error("aucune option de qualité disponible")]
    NoOptions,
    #[error("lecture du choix interactif: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Réduit un libellé à ses alphanumériques en minuscules.
/// Idempotent: `normalize_key(normalize_key(x)) == normalize_key(x)`.
pub fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Libellé canonique d'une qualité demandée: un alias familier («4k»)
/// devient la tournure canonique du site, sinon le texte épuré tel quel.
pub fn resolve_quality_label(profile: &SiteProfile, raw: &str) -> String {
    let key = normalize_key(raw);
    match profile.preset_label(&key) {
        Some(label) => label.to_string(),
        None => raw.trim().to_string(),
    }
}

fn format_option_label(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Attend qu'au moins un lien de qualité existe pour la vidéo donnée et les
/// rend tous, annotés de leur clé normalisée, dans l'ordre de découverte.
pub async fn collect_quality_options<D: Driver>(
    driver: &D,
    profile: &SiteProfile,
    video_id: &str,
) -> DriverResult<Vec<QualityOption<D::Elem>>> {
    let locator = profile.quality_links_locator(video_id);
    let locator = &locator;
    let poll = Poll::new(profile.timeouts.quality_collect(), profile.timeouts.poll_interval());

    let options = poll_until(poll, || async move {
        // Les liens sont fréquemment recouverts: on balaye avant chaque essai.
        let _ = defense::sweep_overlays(driver).await;
        let elements = driver.find_all(locator).await.ok()?;
        let mut found = Vec::new();
        for element in elements {
            let Some(href) = element.attr("href").await.ok().flatten() else {
                continue;
            };
            let text = element.text().await.unwrap_or_default();
            let mut label = format_option_label(&text);
            if label.is_empty() {
                label = href.clone();
            }
            found.push(QualityOption {
                normalized: normalize_key(&label),
                label,
                href,
                element,
            });
        }
        if found.is_empty() { None } else { Some(found) }
    })
    .await;

    options.ok_or_else(|| {
        DriverError::Timeout(format!("aucun lien de qualité pour la vidéo {video_id}"))
    })
}

/// Choisit une option selon la qualité demandée.
///
/// Les deux formes normalisées de la demande (brute et préréglage) sont
/// comparées par sous-chaîne; la première option qui répond gagne, dans
/// l'ordre de découverte. Sans correspondance: invite interactive si
/// permise, erreur si la correspondance est exigée, sinon repli sur la
/// première option.
pub fn select_quality_option<'a, E, R>(
    options: &'a [QualityOption<E>],
    profile: &SiteProfile,
    desired_label: &str,
    allow_prompt: bool,
    require_match: bool,
    mut read_line: R,
) -> Result<&'a QualityOption<E>, QualityError>
where
    R: FnMut() -> std::io::Result<String>,
{
    if options.is_empty() {
        return Err(QualityError::NoOptions);
    }

    if !desired_label.is_empty() {
        let mut variants = vec![normalize_key(desired_label)];
        let preset = normalize_key(&resolve_quality_label(profile, desired_label));
        if !variants.contains(&preset) {
            variants.push(preset);
        }
        variants.retain(|v| !v.is_empty());

        for option in options {
            if variants.iter().any(|v| option.normalized.contains(v.as_str())) {
                info!("qualité demandée '{desired_label}' associée à: {}", option.label);
                return Ok(option);
            }
        }
        warn!("aucune option ne correspond à la qualité demandée '{desired_label}'");
    }

    if allow_prompt {
        return choose_interactively(options, &mut read_line);
    }
    if require_match && !desired_label.is_empty() {
        return Err(QualityError::NoMatch(desired_label.to_string()));
    }
    warn!("repli silencieux sur la première option: {}", options[0].label);
    Ok(&options[0])
}

/// Invite énumérée, index 1-based; entrée vide: première option; saisie
/// hors bornes ou non numérique: redemandée.
fn choose_interactively<'a, E, R>(
    options: &'a [QualityOption<E>],
    read_line: &mut R,
) -> Result<&'a QualityOption<E>, QualityError>
where
    R: FnMut() -> std::io::Result<String>,
{
    println!("Options de qualité disponibles:");
    for (idx, option) in options.iter().enumerate() {
        println!(" {}. {}", idx + 1, option.label);
    }
    loop {
        print!("Choisissez la qualité (numéro, défaut 1): ");
        std::io::stdout().flush()?;
        let line = read_line()?;
        let choice = line.trim();
        if choice.is_empty() {
            return Ok(&options[0]);
        }
        if let Ok(index) = choice.parse::<usize>() {
            if (1..=options.len()).contains(&index) {
                return Ok(&options[index - 1]);
            }
        }
        println!("Sélection invalide, entrez un numéro de la liste.");
    }
}
