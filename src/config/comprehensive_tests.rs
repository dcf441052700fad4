//! Additional tests for configuration parsing and validation

use super::tests_support::{clear_harness_env, lock_env};
use super::{ConfigParser, EnvManager};
use crate::{cli::Cli, models::{Config, RouteExpectation}};
use clap::Parser;
use proptest::prelude::*;
use std::env;

mod generators {
    use super::*;

    pub fn backend_names() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,15}"
    }

    pub fn hosts() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("localhost".to_string()),
            "[a-z]{1,10}(\\.[a-z]{2,5}){0,2}",
            (1u8..=254, 0u8..=255, 0u8..=255, 1u8..=254)
                .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
        ]
    }
}

mod property_tests {
    use super::*;

    proptest! {
        /// host:port=backend always parses back to the same parts
        #[test]
        fn route_spec_parses(host in generators::hosts(), port in 1u16.., backend in generators::backend_names()) {
            let spec = format!("{}:{}={}", host, port, backend);
            let route = RouteExpectation::parse(&spec, "localhost").unwrap();
            prop_assert_eq!(route.endpoint.host(), host.as_str());
            prop_assert_eq!(route.endpoint.port(), port);
            prop_assert_eq!(route.expected_backend, backend);
        }

        /// A bare port picks up the default host
        #[test]
        fn bare_port_uses_default_host(port in 1u16.., backend in generators::backend_names()) {
            let route = RouteExpectation::parse(&format!("{}={}", port, backend), "proxy.internal").unwrap();
            prop_assert_eq!(route.endpoint.host(), "proxy.internal");
        }

        /// Thresholds outside (0, 1] never validate
        #[test]
        fn out_of_range_threshold_invalid(threshold in prop_oneof![-10.0f64..=0.0, 1.0001f64..10.0]) {
            let config = Config { dominance_threshold: threshold, ..Config::default() };
            prop_assert!(config.validate().is_err());
        }

        /// Every positive timeout up to the maximum validates
        #[test]
        fn timeout_in_range_valid(timeout in 1u64..=crate::defaults::MAX_TIMEOUT_MS) {
            let config = Config { timeout_ms: timeout, ..Config::default() };
            prop_assert!(config.validate().is_ok());
        }
    }
}

mod config_edge_cases {
    use super::*;

    #[test]
    fn test_many_routes() {
        let config = Config {
            routes: (0..500).map(|i| format!("{}=gs-{}", 20000 + i, i % 7)).collect(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.expected_backend_count().unwrap(), 7);
    }

    #[test]
    fn test_ipv6_route() {
        let config = Config {
            routes: vec!["[::1]:10000=gs-1".to_string()],
            ..Config::default()
        };
        let routes = config.route_expectations().unwrap();
        assert_eq!(routes[0].endpoint.host(), "::1");
        assert_eq!(routes[0].endpoint.to_string(), "[::1]:10000");
    }

    #[test]
    fn test_same_port_different_hosts_allowed() {
        let config = Config {
            routes: vec!["a.local:10000=gs-1".to_string(), "b.local:10000=gs-2".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}

mod env_integration {
    use super::*;

    #[test]
    fn test_routes_from_environment() {
        let _guard = lock_env();
        clear_harness_env();
        env::set_var("HARNESS_ROUTES", " 10000=game-server-1 , ,10001=game-server-2");

        let config = ConfigParser::new(Cli::parse_from(["urh"]))
            .with_env_file("/nonexistent/harness.env")
            .parse()
            .unwrap();
        assert_eq!(config.routes, vec!["10000=game-server-1", "10001=game-server-2"]);

        clear_harness_env();
    }

    #[test]
    fn test_cli_routes_replace_environment_routes() {
        let _guard = lock_env();
        clear_harness_env();
        env::set_var("HARNESS_ROUTES", "10000=game-server-1");

        let config = ConfigParser::new(Cli::parse_from(["urh", "--route", "10005=gs-5"]))
            .with_env_file("/nonexistent/harness.env")
            .parse()
            .unwrap();
        assert_eq!(config.routes, vec!["10005=gs-5"]);

        clear_harness_env();
    }

    #[test]
    fn test_environment_validation_matches_merge() {
        let _guard = lock_env();
        clear_harness_env();
        env::set_var("HARNESS_TIMEOUT_MS", "0");

        assert_eq!(EnvManager::validate_current_env().len(), 1);
        let result = ConfigParser::new(Cli::parse_from(["urh"]))
            .with_env_file("/nonexistent/harness.env")
            .parse();
        assert!(result.is_err());

        clear_harness_env();
    }
}
