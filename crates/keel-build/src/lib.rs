//! Source staging, build-mode detection, and slug handling for keel.
//!
//! # Build pipeline
//!
//! ```text
//! keel-builder <user> <repo> <sha>
//!   1. Stage        ── git archive <sha> → <repo>/build/<uuid>/
//!   2. Detect       ── Dockerfile present? → BuildMode
//!   3. Build        ── docker build, or slugbuilder → slug.tgz → SlugDockerfile
//!   4. Push         ── docker push <registry>/<app>:git-<short>
//!   5. Procfile     ── ProcessTypeSource::locate()
//!   6. Release      ── POST /v1/hooks/build
//!   7. Cleanup      ── git gc, docker rm -f
//! ```
//!
//! # Process types
//!
//! Resolved from the first source that exists, in order:
//! - `Procfile` at the staged root
//! - `Procfile` inside `slug.tgz`
//! - `default_process_types` from `.release` inside `slug.tgz`
//!
//! A source that exists but cannot be parsed yields an empty map.

pub mod detect;
pub mod dockerfile;
pub mod process_types;
pub mod stage;

pub use detect::BuildMode;
pub use dockerfile::SlugDockerfile;
pub use process_types::ProcessTypeSource;
