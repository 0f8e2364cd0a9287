//! Deterministic probe ordering: a service is ranked by `MD5(hash + uuid)`
//! ascending.
//!
//! This is a rendezvous-hashing shape: a content-dependent key computed per
//! candidate, then sorted. The key is `MD5(hash + uuid)` rather than XOR
//! distance, because the goal is load spreading across a fixed set of HTTP
//! endpoints rather than routing toward a target node id.

use keep_types::ServiceDirectoryEntry;

/// Sort `entries` by ascending `MD5(hash + entry.uuid)`. The same `hash`
/// and the same entry set always produce byte-identical output, so the
/// same block preferentially lands on (and is found on) the same subset of
/// services regardless of which client computed the order.
pub fn rank(hash: &str, entries: &[ServiceDirectoryEntry]) -> Vec<ServiceDirectoryEntry> {
    let mut ranked: Vec<(keep_crypto::Digest16, ServiceDirectoryEntry)> = entries
        .iter()
        .map(|entry| {
            let mut fingerprint_input = String::with_capacity(hash.len() + entry.uuid.len());
            fingerprint_input.push_str(hash);
            fingerprint_input.push_str(&entry.uuid);
            (keep_crypto::digest(fingerprint_input.as_bytes()), entry.clone())
        })
        .collect();

    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked.into_iter().map(|(_, entry)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uuid: &str) -> ServiceDirectoryEntry {
        ServiceDirectoryEntry {
            uuid: uuid.to_string(),
            root_url: format!("http://{uuid}.example"),
            writable: true,
            local_or_proxy: true,
            region: None,
        }
    }

    // Deterministic shuffle fixture: same hash and uuid set always
    // produce the same ranked order.
    #[test]
    fn scenario_one_deterministic_shuffle_foo() {
        let h1 = entry("zzzzz-bi6l4-2q7dq8becevdqfb");
        let h2 = entry("zzzzz-bi6l4-4gbhck2w7lq0d96");
        let h3 = entry("zzzzz-bi6l4-4bt69dsk0quh7ae");
        let h4 = entry("zzzzz-bi6l4-62w1fgd0ud2krxl");
        let roots = vec![h1.clone(), h2.clone(), h3.clone(), h4.clone()];

        let hash = keep_crypto::digest_hex(b"foo");
        assert_eq!(hash, "acbd18db4cc2f85cedef654fccc4a4d8");

        let ordered = rank(&hash, &roots);
        let uuids: Vec<&str> = ordered.iter().map(|e| e.uuid.as_str()).collect();
        assert_eq!(
            uuids,
            vec![h4.uuid.as_str(), h1.uuid.as_str(), h3.uuid.as_str(), h2.uuid.as_str()]
        );
    }

    #[test]
    fn scenario_one_deterministic_shuffle_bar() {
        let h1 = entry("zzzzz-bi6l4-2q7dq8becevdqfb");
        let h2 = entry("zzzzz-bi6l4-4gbhck2w7lq0d96");
        let h3 = entry("zzzzz-bi6l4-4bt69dsk0quh7ae");
        let h4 = entry("zzzzz-bi6l4-62w1fgd0ud2krxl");
        let roots = vec![h1.clone(), h2.clone(), h3.clone(), h4.clone()];

        let hash = keep_crypto::digest_hex(b"bar");
        assert_eq!(hash, "37b51d194a7513e45b56f6524f2d51f2");

        let ordered = rank(&hash, &roots);
        let uuids: Vec<&str> = ordered.iter().map(|e| e.uuid.as_str()).collect();
        assert_eq!(
            uuids,
            vec![h3.uuid.as_str(), h2.uuid.as_str(), h4.uuid.as_str(), h1.uuid.as_str()]
        );
    }

    #[test]
    fn rank_is_a_permutation_and_deterministic() {
        let roots: Vec<_> = (0..6).map(|i| entry(&format!("svc-{i}"))).collect();
        let hash = keep_crypto::digest_hex(b"some block contents");

        let first = rank(&hash, &roots);
        let second = rank(&hash, &roots);
        assert_eq!(first, second);

        let mut sorted_uuids: Vec<&str> = first.iter().map(|e| e.uuid.as_str()).collect();
        sorted_uuids.sort();
        let mut expected: Vec<&str> = roots.iter().map(|e| e.uuid.as_str()).collect();
        expected.sort();
        assert_eq!(sorted_uuids, expected);
    }

    #[test]
    fn different_hashes_generally_produce_different_orders() {
        let roots: Vec<_> = (0..8).map(|i| entry(&format!("svc-{i}"))).collect();
        let order_a = rank(&keep_crypto::digest_hex(b"aaa"), &roots);
        let order_b = rank(&keep_crypto::digest_hex(b"zzz"), &roots);
        assert_ne!(order_a, order_b);
    }
}
