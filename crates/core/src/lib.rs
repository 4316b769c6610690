#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

//! Core library for the odata-inquirer CLI.
//!
//! `odata_inquirer_core` provides:
//! - the value-help confirm prompt and its prefetch cache via [`prompt`]
//! - value-list reference extraction via [`value_list`]
//! - service provider handles via [`providers`]
//! - provider resolution from a validated connection via [`connection`]
//! - SAP Business Application Studio helpers via [`app_studio`]
//! - shared service state and configuration types via [`types`]
//!
//! # Quick Start
//!
//! ```no_run
//! use odata_inquirer_core::connection::ValidatedConnection;
//! use odata_inquirer_core::prompt::ValueHelpPrompt;
//! use odata_inquirer_core::providers::ConnectionConfig;
//! use odata_inquirer_core::types::{DatasourceType, OdataServiceState};
//!
//! # async fn demo(mut state: OdataServiceState) {
//! let connection = ValidatedConnection {
//!     validated_url: Some("https://abap.example.com/sap/opu/odata/sap/SRV".to_string()),
//!     config: ConnectionConfig::new("https://abap.example.com"),
//!     ..ValidatedConnection::default()
//! };
//! let mut prompt = ValueHelpPrompt::new("odataService");
//! if prompt.when(&state) {
//!     prompt
//!         .validate_with_connection(true, &mut state, &connection, DatasourceType::OdataServiceUrl)
//!         .await;
//! }
//! println!("{:?}", state.value_list_references);
//! # }
//! ```

pub mod app_studio;
pub mod connection;
pub mod prompt;
pub mod providers;
pub mod types;
pub mod value_list;
