//! Pilotage résilient du navigateur.
//!
//! Ce module regroupe:
//! - **driver**: l'interface étroite du moteur et sa taxonomie d'erreurs.
//! - **webdriver**: l'implémentation réelle via chromedriver, durcissement
//!   et blocage réseau compris.
//! - **brave**: localisation de Brave et réglage des Shields.
//! - **defense**: scripts de neutralisation des popups et superpositions.
//! - **wait**: sondage borné, attentes de chargement et de préfixe d'URL.
//! - **locator**: recherche d'éléments cliquables à budget de tentatives.
//! - **click**: clic natif avec repli script et détection de fenêtre.
//! - **frames**: résolution du bouton final à travers les iframes.
//!
//! Conception:
//! - Tout composant au-dessus de `driver` est générique sur le trait
//!   [`driver::Driver`], donc exerçable contre le moteur simulé de
//!   `testing` sans navigateur réel.
//! - Toutes les attentes sont bornées; l'absence structurelle remonte en
//!   erreur de type délai dépassé, jamais en boucle infinie.
pub mod brave;
pub mod click;
pub mod defense;
pub mod driver;
pub mod frames;
pub mod locator;
#[cfg(test)]
pub mod testing;
pub mod wait;
pub mod webdriver;
