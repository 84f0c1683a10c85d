//! eCFR word-frequency pipeline: ingestion, job planning, subdivision extraction, text
//! normalization, concurrent job dispatch, and year/agency aggregation over the U.S.
//! Electronic Code of Federal Regulations.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod models;
pub mod normalizer;
pub mod path_map;
pub mod planner;
pub mod stopwords;
pub mod store;
