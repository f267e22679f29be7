//! Intégration Brave: localisation du binaire et du profil, passage des
//! Shields en mode agressif.
//!
//! Le réglage se fait en réécrivant une seule clé du fichier `Preferences`
//! du profil. Un fichier absent ou mal formé est signalé et laissé tel
//! quel, jamais réparé avec des valeurs par défaut.
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tracing::{info, warn};

/// Cherche le binaire Brave aux emplacements usuels de chaque plateforme.
pub fn locate_binary() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for var in ["PROGRAMFILES", "ProgramFiles(x86)", "LOCALAPPDATA"] {
        if let Ok(base) = std::env::var(var) {
            candidates.push(
                Path::new(&base)
                    .join("BraveSoftware")
                    .join("Brave-Browser")
                    .join("Application")
                    .join("brave.exe"),
            );
        }
    }
    candidates.push(PathBuf::from("/usr/bin/brave-browser"));
    candidates.push(PathBuf::from("/usr/bin/brave"));
    candidates.push(PathBuf::from(
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    ));
    candidates.into_iter().find(|path| path.is_file())
}

/// Répertoire de données utilisateur de Brave, s'il existe.
pub fn locate_user_data_dir() -> Option<PathBuf> {
    if let Ok(local) = std::env::var("LOCALAPPDATA") {
        let windows = Path::new(&local)
            .join("BraveSoftware")
            .join("Brave-Browser")
            .join("User Data");
        if windows.exists() {
            return Some(windows);
        }
    }
    let unix = dirs::config_dir()?.join("BraveSoftware").join("Brave-Browser");
    unix.exists().then_some(unix)
}

/// Force `brave.shields.adblock_mode` à 2 (agressif) dans `Preferences`.
/// Sans effet si la valeur est déjà en place.
pub fn ensure_shields_aggressive(preferences_path: &Path) {
    let text = match std::fs::read_to_string(preferences_path) {
        Ok(text) => text,
        Err(err) => {
            warn!(
                "préférences Brave illisibles ({}): {err}",
                preferences_path.display()
            );
            return;
        }
    };
    let mut prefs: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                "préférences Brave mal formées ({}), laissées telles quelles: {err}",
                preferences_path.display()
            );
            return;
        }
    };
    let Some(root) = prefs.as_object_mut() else {
        warn!("préférences Brave inattendues (pas un objet), laissées telles quelles");
        return;
    };

    let shields = root
        .entry("brave")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .map(|brave| brave.entry("shields").or_insert_with(|| json!({})));
    let Some(shields) = shields.and_then(Value::as_object_mut) else {
        warn!("section shields inattendue dans les préférences Brave");
        return;
    };

    if shields.get("adblock_mode").and_then(Value::as_i64) == Some(2) {
        return;
    }
    shields.insert("adblock_mode".into(), json!(2));

    match serde_json::to_string_pretty(&prefs) {
        Ok(rendered) => match std::fs::write(preferences_path, rendered) {
            Ok(()) => info!("Brave Shields passé en mode agressif"),
            Err(err) => warn!("écriture des préférences Brave impossible: {err}"),
        },
        Err(err) => warn!("sérialisation des préférences Brave impossible: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn un_fichier_absent_est_tolere() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Preferences");
        ensure_shields_aggressive(&path);
        assert!(!path.exists(), "le fichier ne doit pas être créé");
    }

    #[test]
    fn un_fichier_mal_forme_reste_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Preferences");
        fs::write(&path, "{pas du json").unwrap();
        ensure_shields_aggressive(&path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{pas du json");
    }

    #[test]
    fn une_valeur_deja_en_place_ne_reecrit_pas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Preferences");
        let original = r#"{"brave":{"shields":{"adblock_mode":2}},"autre":1}"#;
        fs::write(&path, original).unwrap();
        ensure_shields_aggressive(&path);
        // Pas de réécriture: le contenu est octet pour octet identique.
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn le_mode_est_pose_en_preservant_le_reste() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Preferences");
        fs::write(&path, r#"{"brave":{"shields":{"adblock_mode":1}},"autre":{"garde":true}}"#)
            .unwrap();
        ensure_shields_aggressive(&path);
        let prefs: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(prefs["brave"]["shields"]["adblock_mode"], json!(2));
        assert_eq!(prefs["autre"]["garde"], json!(true));
    }

    #[test]
    fn les_sections_manquantes_sont_creees() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Preferences");
        fs::write(&path, r#"{}"#).unwrap();
        ensure_shields_aggressive(&path);
        let prefs: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(prefs["brave"]["shields"]["adblock_mode"], json!(2));
    }
}
