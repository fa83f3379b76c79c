//! TechStore Storefront
//!
//! The page side of the store: product catalog with search and category
//! filters, the shopping cart, connectivity status, and capture of cart
//! actions taken offline so the worker can sync them later.

pub mod cart;
pub mod catalog;
pub mod connectivity;
pub mod controller;
pub mod error;

pub use cart::{Cart, CartLine, CartSummary};
pub use catalog::{Catalog, CatalogItem, Category, CategoryFilter, Price};
pub use connectivity::{Banner, BannerKind, Connectivity};
pub use controller::{Receipt, Storefront};
pub use error::StorefrontError;
