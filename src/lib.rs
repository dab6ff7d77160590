//! Client for a remote query-planning service.
//!
//! The crate keeps an ordered list of applied plan-transformation rules in
//! step with the planner, runs queries against the agreed rule order, and
//! keeps the client-side view of results, plan images, execution history and
//! datasets.
//!
//! ```no_run
//! use std::sync::Arc;
//! use plansync::{
//!     api::HttpPlanner, catalog::Direction, config::ClientConfig, notify::TracingNotifier,
//!     session::{Session, SessionOptions},
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::load(None)?;
//! let planner = Arc::new(HttpPlanner::new(config.base_url()?)?);
//! let mut session = Session::new(
//!     planner,
//!     SessionOptions::from_config(&config),
//!     Arc::new(TracingNotifier),
//! );
//! session.start().await;
//! session.rules_mut().select("FilterPushDownRule")?;
//! let report = session.rules_mut().move_selected(Direction::Up).await?;
//! println!("applied order: {:?}", report.applied);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod datasets;
pub mod error;
pub mod executor;
pub mod history;
pub mod model;
pub mod notify;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod viz;

pub use error::{ClientError, Result, SelectionScope};
