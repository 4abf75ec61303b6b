//! # modelseal-cli
//!
//! Provides the `modelseal` command-line interface.
//!
//! ## Subcommands
//!
//! - `modelseal protect`: encrypt model artifacts into a signed protected
//!   model and write the matching master license.
//! - `modelseal keystore generate`: create a software keystore holding a
//!   fresh identity key and its self-issued certificate.
//!
//! ```bash
//! modelseal keystore generate --subject acme --days 365 --out isv.json
//! modelseal -v protect -i model.xml model.bin -n resnet -d "image model" \
//!     --model-version 1.0 -k isv.json -p resnet.dat -m resnet.masterlic \
//!     -g 2b6f4c1e-8a3d-4f5b-9c7e-1d2a3b4c5d6e
//! ```

pub mod config;
pub mod keystore;
pub mod protect;

pub use config::Settings;
