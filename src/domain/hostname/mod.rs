//! Hostname handling for origin allow-lists

mod matcher;

pub use matcher::{
    is_subdomain_of, main_domain, matches_allow_list, matches_environment,
    normalize_allow_list_entry, normalize_host, subdomain_prefix, Environment,
};
