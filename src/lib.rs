//! Timeline post classifier and topic filter.
//!
//! Scans a social-media timeline page, classifies each post into a topic with a
//! pluggable backend (local keywords or a remote chat-completions API) and
//! hides or annotates posts according to per-topic preferences.
//!
//! Data flows one way: [`observer`] → [`extract`] → [`controller`] →
//! [`classify`] → [`category`] → [`annotate`].

pub mod annotate;
pub mod category;
pub mod classify;
pub mod config;
pub mod controller;
pub mod dom;
pub mod extract;
pub mod observer;
pub mod session;
pub mod settings;
pub mod storage;
pub mod util;
