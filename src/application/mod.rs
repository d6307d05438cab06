//! Application services: page loaders, SEO mapping, CMS slots, sitemap and feed.

pub mod cms;
pub mod context;
pub mod criteria;
pub mod error;
pub mod feed;
pub mod page;
pub mod repos;
pub mod search;
pub mod seo;
pub mod sitemap;
