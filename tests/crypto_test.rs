use std::sync::Arc;

use ruscript::crypto::{RandomSource, random_uuid};
use ruscript::http::{RequestSnapshot, ResponseSnapshot};
use ruscript::variable::Environments;
use ruscript::{PreRequestContext, ScriptRunner, TestContext};

fn test_context() -> TestContext {
    TestContext {
        request: RequestSnapshot::new("POST", "https://example.com/sign"),
        response: ResponseSnapshot::new(200, "signed"),
        envs: Environments::default(),
        cookies: None,
    }
}

fn run_tests(script: &str) -> ruscript::runner::TestRunResult {
    ScriptRunner::new()
        .run_test_script_blocking(script, test_context())
        .unwrap()
}

fn assert_all_pass(result: &ruscript::runner::TestRunResult) {
    for node in &result.tests.children {
        assert!(
            node.all_passed(),
            "{} results: {:?}",
            node.descriptor,
            node.expect_results
        );
    }
    assert!(!result.tests.children.is_empty());
}

#[test]
fn test_symmetric_round_trips() {
    let result = run_tests(
        r#"
        let cases = [
            [#{ name: "AES-GCM", length: 256 }, #{ name: "AES-GCM", iv: crypto::getRandomValues([0,0,0,0,0,0,0,0,0,0,0,0]) }],
            [#{ name: "AES-CBC", length: 128 }, #{ name: "AES-CBC", iv: crypto::getRandomValues([0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]) }],
            [#{ name: "AES-CTR", length: 192 }, #{ name: "AES-CTR", counter: [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0], length: 64 }],
        ];
        for tc in cases {
            let key_params = tc[0];
            let params = tc[1];
            pm::test(key_params.name, || {
                let key = crypto::subtle.generateKey(key_params, false, ["encrypt", "decrypt"]);
                for data in [[], [1, 2, 3], [255, 0, 128, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7]] {
                    let sealed = crypto::subtle.encrypt(params, key, data);
                    pm::expect(crypto::subtle.decrypt(params, key, sealed)).to.eql(data);
                }
            });
        }
        "#,
    );
    assert_all_pass(&result);
    assert_eq!(result.tests.children.len(), 3);
}

#[test]
fn test_signatures_verify_and_reject() {
    let result = run_tests(
        r#"
        let secret_cases = [
            [#{ name: "HMAC", hash: "SHA-256" }, #{ name: "HMAC" }],
            [#{ name: "HMAC", hash: "SHA-512" }, "HMAC"],
        ];
        for tc in secret_cases {
            let key_params = tc[0];
            let params = tc[1];
            pm::test("HMAC " + key_params.hash, || {
                let key = crypto::subtle.generateKey(key_params, true, ["sign", "verify"]);
                let other = crypto::subtle.generateKey(key_params, true, ["sign", "verify"]);
                let sig = crypto::subtle.sign(params, key, "payload");
                pm::expect(crypto::subtle.verify(params, key, sig, "payload")).to.equal(true);
                pm::expect(crypto::subtle.verify(params, key, sig, "tampered")).to.equal(false);
                pm::expect(crypto::subtle.verify(params, other, sig, "payload")).to.equal(false);
            });
        }

        let pair_cases = [
            [#{ name: "ECDSA", namedCurve: "P-256" }, #{ name: "ECDSA", hash: "SHA-256" }],
            [#{ name: "ECDSA", namedCurve: "P-384" }, #{ name: "ECDSA", hash: "SHA-384" }],
            [#{ name: "RSA-PSS", modulusLength: 1024, publicExponent: [1, 0, 1], hash: "SHA-256" }, #{ name: "RSA-PSS", saltLength: 32 }],
            [#{ name: "RSASSA-PKCS1-v1_5", modulusLength: 1024, publicExponent: [1, 0, 1], hash: "SHA-256" }, #{ name: "RSASSA-PKCS1-v1_5" }],
        ];
        for tc in pair_cases {
            let key_params = tc[0];
            let params = tc[1];
            pm::test(params.name, || {
                let pair = crypto::subtle.generateKey(key_params, false, ["sign", "verify"]);
                let other = crypto::subtle.generateKey(key_params, false, ["sign", "verify"]);
                pm::expect(pair.publicKey.type).to.equal("public");
                pm::expect(pair.privateKey.usages).to.eql(["sign"]);
                let sig = crypto::subtle.sign(params, pair.privateKey, [1, 2, 3]);
                pm::expect(crypto::subtle.verify(params, pair.publicKey, sig, [1, 2, 3])).to.equal(true);
                pm::expect(crypto::subtle.verify(params, pair.publicKey, sig, [1, 2, 4])).to.equal(false);
                pm::expect(crypto::subtle.verify(params, other.publicKey, sig, [1, 2, 3])).to.equal(false);
            });
        }
        "#,
    );
    assert_all_pass(&result);
    assert_eq!(result.tests.children.len(), 6);
}

#[test]
fn test_rsa_oaep_round_trip() {
    let result = run_tests(
        r#"
        pm::test("RSA-OAEP", || {
            let pair = crypto::subtle.generateKey(
                #{ name: "RSA-OAEP", modulusLength: 1024, publicExponent: [1, 0, 1], hash: "SHA-256" },
                true,
                ["encrypt", "decrypt"]
            );
            let params = #{ name: "RSA-OAEP" };
            for data in [[], [42, 43]] {
                let sealed = crypto::subtle.encrypt(params, pair.publicKey, data);
                pm::expect(crypto::subtle.decrypt(params, pair.privateKey, sealed)).to.eql(data);
            }
        });
        "#,
    );
    assert_all_pass(&result);
}

#[test]
fn test_decrypt_mismatch_is_error() {
    let result = run_tests(
        r#"
        pm::test("wrong iv", || {
            let key = crypto::subtle.generateKey(#{ name: "AES-GCM", length: 128 }, false, ["encrypt", "decrypt"]);
            let sealed = crypto::subtle.encrypt(#{ name: "AES-GCM", iv: [1,1,1,1,1,1,1,1,1,1,1,1] }, key, [1, 2, 3]);
            crypto::subtle.decrypt(#{ name: "AES-GCM", iv: [2,2,2,2,2,2,2,2,2,2,2,2] }, key, sealed);
        });
        pm::test("missing usage", || {
            let key = crypto::subtle.generateKey(#{ name: "AES-GCM", length: 128 }, false, ["encrypt"]);
            let params = #{ name: "AES-GCM", iv: [1,1,1,1,1,1,1,1,1,1,1,1] };
            crypto::subtle.decrypt(params, key, crypto::subtle.encrypt(params, key, [1]));
        });
        "#,
    );
    for name in ["wrong iv", "missing usage"] {
        let node = result.tests.child(name).unwrap();
        assert_eq!(node.expect_results.len(), 1, "{}", name);
        assert!(!node.passed(), "{} should record an error", name);
    }
}

#[test]
fn test_digest_from_pre_request() {
    let result = ScriptRunner::new()
        .run_pre_request_script_blocking(
            r#"
            let hash = crypto::subtle.digest("SHA-1", "abc");
            let hex = "";
            for b in hash {
                if b < 16 { hex += "0"; }
                hex += b.to_hex();
            }
            hopp::env.set("sha1", hex);
            "#,
            PreRequestContext::default(),
        )
        .unwrap();
    assert_eq!(
        result.updated_envs.get("sha1").unwrap().value,
        "a9993e364706816aba3e25717850c26c9cd0d89d"
    );
}

struct CountingSource(u8);

impl RandomSource for CountingSource {
    fn fill(&self, buf: &mut [u8]) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.0.wrapping_add(i as u8);
        }
    }
}

#[test]
fn test_uuid_derived_from_random_values() {
    let uuid = random_uuid(&CountingSource(0));
    assert_eq!(uuid.len(), 36);
    assert_eq!(&uuid[14..15], "4");
    assert!(matches!(&uuid[19..20], "8" | "9" | "a" | "b"));

    let runner = ScriptRunner::new().with_random_source(Arc::new(CountingSource(0)));
    let result = runner
        .run_pre_request_script_blocking(
            r#"hopp::env.set("id", crypto::randomUUID());"#,
            PreRequestContext::default(),
        )
        .unwrap();
    assert_eq!(result.updated_envs.get("id").unwrap().value, uuid);
}
