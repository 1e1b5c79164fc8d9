use proptest::prelude::*;
use rampart_client::{ApiRequest, CACHE_BUSTER_PARAM};
use rampart_test_utils::generators::{arb_endpoint, arb_get_request, arb_method};

proptest! {
    #[test]
    fn cache_key_ignores_parameter_order(request in arb_get_request()) {
        let reversed = request
            .query
            .iter()
            .rev()
            .fold(ApiRequest::get(request.endpoint.clone()), |r, (k, v)| {
                r.with_query(k.clone(), v)
            });
        prop_assert_eq!(reversed.cache_key(), request.cache_key());
    }

    #[test]
    fn cache_buster_never_changes_key(request in arb_get_request(), stamp in any::<u64>()) {
        let busted = request.clone().with_query(CACHE_BUSTER_PARAM, stamp);
        prop_assert!(busted.bypasses_cache());
        prop_assert!(!request.bypasses_cache());
        prop_assert_eq!(busted.cache_key(), request.cache_key());
    }

    #[test]
    fn cache_key_starts_with_method_and_endpoint(request in arb_get_request()) {
        let key = request.cache_key();
        let prefix = format!("GET {}", request.endpoint);
        prop_assert!(key.starts_with(&prefix));
        prop_assert_eq!(key.contains('?'), !request.query.is_empty());
    }

    #[test]
    fn methods_never_share_keys(
        a in arb_method(),
        b in arb_method(),
        endpoint in arb_endpoint(),
    ) {
        let first = ApiRequest::new(a, endpoint.clone());
        let second = ApiRequest::new(b, endpoint);
        prop_assert!(first.cache_key().starts_with(a.as_str()));
        prop_assert_eq!(first.cache_key() == second.cache_key(), a == b);
    }

    #[test]
    fn separators_in_values_never_collide(
        endpoint in arb_endpoint(),
        value in "[a-z0-9&=?%]{0,8}",
        other in "[a-z0-9&=?%]{0,8}",
    ) {
        prop_assume!(value != other);
        let a = ApiRequest::get(endpoint.clone()).with_query("q", &value);
        let b = ApiRequest::get(endpoint).with_query("q", &other);
        prop_assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn resource_is_a_prefix_of_the_endpoint(request in arb_get_request()) {
        prop_assert!(request.endpoint.starts_with(request.resource()));
        prop_assert!(!request.resource()[1..].contains('/'));
    }
}
