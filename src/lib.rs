pub mod aggregate;
pub mod cache;
pub mod config;
pub mod domain;
pub mod ebird;
pub mod error;
pub mod fetcher;
pub mod observation;
pub mod output;
pub mod pager;
pub mod rarelist;
pub mod rarity;
pub mod scope;
pub mod session;
