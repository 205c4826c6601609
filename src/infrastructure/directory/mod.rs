//! Directory service clients

mod graphql;

pub use graphql::GraphQlDirectoryClient;
