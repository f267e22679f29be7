//! Tunnel de récupération du lien de téléchargement direct.
//!
//! Ce module regroupe:
//! - **orchestrator**: la machine à états qui enchaîne les pages du tunnel
//!   avec retentatives bornées et session neuve à chaque tentative.
//! - **quality**: découverte et sélection floue des variantes de qualité.
//! - **direct**: le raccourci des serveurs classiques, sans tunnel.
pub mod direct;
pub mod orchestrator;
pub mod quality;

pub use orchestrator::{FunnelRequest, run_automation};
