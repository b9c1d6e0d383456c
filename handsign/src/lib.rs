//! handsign: recognition of static hand signs from per-frame hand keypoints.
//!
//! Landmark frames go in, cooldown-gated words come out. The engine lives in
//! [`recognition`]; [`transcript`] assembles accepted words into sentences
//! and [`ipc`] exposes both over a line-based s-expression protocol.

pub mod ipc;
pub mod recognition;
pub mod transcript;
