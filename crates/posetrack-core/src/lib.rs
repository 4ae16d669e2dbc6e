//! # PoseTrack Core Library
//!
//! Core functionality for the PoseTrack arm-curl tracker.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The tracking channel protocol (`start_tracking`, `stop_tracking`, `pose_data`)
//! - A client session controller with bounded sliding-window chart series
//! - Elbow angle and curl rep counting
//! - A tracking server with an MJPEG live feed
//! - A demo landmark source for running without a camera
//!
//! ## Example
//!
//! ```rust,ignore
//! use posetrack_core::{config::SessionConfig, session::SessionController, transport};
//! use std::sync::Arc;
//!
//! let (sender, receiver) = transport::connect("127.0.0.1:5000").await?;
//! let session = Arc::new(SessionController::new(Arc::new(sender), SessionConfig::default()));
//! let _subscription = session.subscribe(receiver);
//!
//! session.start();
//! // ... pose_data updates session.state() and session.series()
//! session.stop();
//! ```

pub mod config;
pub mod demo;
pub mod export;
pub mod mjpeg;
pub mod protocol;
pub mod server;
pub mod session;
pub mod source;
pub mod tracking;
pub mod transport;
pub mod window;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{PoseTrackConfig, ServerConfig, SessionConfig, TrackingConfig};
    pub use crate::demo::DemoSource;
    pub use crate::protocol::{ClientEvent, PoseSample, ProtocolError, ServerEvent, Stage};
    pub use crate::server::TrackingServer;
    pub use crate::session::{SessionController, SessionState, Subscription};
    pub use crate::source::{LandmarkFrame, LandmarkSource};
    pub use crate::tracking::{ArmLandmarks, Point, PoseTracker, RepCounter};
    pub use crate::transport::{connect, SignalSink};
    pub use crate::window::{Channel, PoseSeries, SlidingWindow};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
