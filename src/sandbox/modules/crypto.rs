use std::sync::Arc;

use rhai::{Array, Dynamic, Engine, Map, Module};

use crate::crypto::{self, CryptoError, CryptoKey, GeneratedKey, RandomSource};
use crate::sandbox::boundary::{RhaiResult, byte_array, bytes, throw, to_dynamic, to_json};
use crate::sandbox::modules::finish;

/// `crypto::subtle`
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtleApi;

fn crypto_err(err: CryptoError) -> Box<rhai::EvalAltResult> {
    throw(err.to_string())
}

fn usages(value: &Array) -> RhaiResult<Vec<String>> {
    value
        .iter()
        .map(|usage| {
            if usage.is_string() {
                Ok(usage.to_string())
            } else {
                Err(throw("TypeError: key usages must be strings"))
            }
        })
        .collect()
}

fn generated(key: GeneratedKey) -> Dynamic {
    match key {
        GeneratedKey::Secret(key) => Dynamic::from(key),
        GeneratedKey::Pair {
            public_key,
            private_key,
        } => {
            let mut pair = Map::new();
            pair.insert("publicKey".into(), Dynamic::from(public_key));
            pair.insert("privateKey".into(), Dynamic::from(private_key));
            Dynamic::from_map(pair)
        }
    }
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<CryptoKey>("CryptoKey")
        .register_get("type", |key: &mut CryptoKey| key.key_type.as_str().to_string())
        .register_get("algorithm", |key: &mut CryptoKey| to_dynamic(&key.algorithm.to_json()))
        .register_get("extractable", |key: &mut CryptoKey| key.extractable)
        .register_get("usages", |key: &mut CryptoKey| -> Array {
            key.usages.iter().map(|u| Dynamic::from(u.clone())).collect()
        })
        .register_fn("to_string", |key: &mut CryptoKey| format!("{:?}", key));

    engine
        .register_type_with_name::<SubtleApi>("SubtleCrypto")
        .register_fn("digest", |_: SubtleApi, algorithm: Dynamic, data: Dynamic| -> RhaiResult<Array> {
            let out = crypto::digest(&to_json(&algorithm)?, &bytes(&data, "data")?)
                .map_err(crypto_err)?;
            Ok(byte_array(&out))
        })
        .register_fn(
            "generateKey",
            |_: SubtleApi, algorithm: Dynamic, extractable: bool, key_usages: Array| -> RhaiResult<Dynamic> {
                let key = crypto::generate_key(&to_json(&algorithm)?, extractable, &usages(&key_usages)?)
                    .map_err(crypto_err)?;
                Ok(generated(key))
            },
        )
        .register_fn(
            "importKey",
            |_: SubtleApi,
             format: &str,
             key_data: Dynamic,
             algorithm: Dynamic,
             extractable: bool,
             key_usages: Array|
             -> RhaiResult<CryptoKey> {
                crypto::import_key(
                    format,
                    &bytes(&key_data, "keyData")?,
                    &to_json(&algorithm)?,
                    extractable,
                    &usages(&key_usages)?,
                )
                .map_err(crypto_err)
            },
        )
        .register_fn("exportKey", |_: SubtleApi, format: &str, key: CryptoKey| -> RhaiResult<Array> {
            let raw = crypto::export_key(format, &key).map_err(crypto_err)?;
            Ok(byte_array(&raw))
        })
        .register_fn(
            "sign",
            |_: SubtleApi, algorithm: Dynamic, key: CryptoKey, data: Dynamic| -> RhaiResult<Array> {
                let signature = crypto::sign(&to_json(&algorithm)?, &key, &bytes(&data, "data")?)
                    .map_err(crypto_err)?;
                Ok(byte_array(&signature))
            },
        )
        .register_fn(
            "verify",
            |_: SubtleApi,
             algorithm: Dynamic,
             key: CryptoKey,
             signature: Dynamic,
             data: Dynamic|
             -> RhaiResult<bool> {
                crypto::verify(
                    &to_json(&algorithm)?,
                    &key,
                    &bytes(&signature, "signature")?,
                    &bytes(&data, "data")?,
                )
                .map_err(crypto_err)
            },
        )
        .register_fn(
            "encrypt",
            |_: SubtleApi, algorithm: Dynamic, key: CryptoKey, data: Dynamic| -> RhaiResult<Array> {
                let out = crypto::encrypt(&to_json(&algorithm)?, &key, &bytes(&data, "data")?)
                    .map_err(crypto_err)?;
                Ok(byte_array(&out))
            },
        )
        .register_fn(
            "decrypt",
            |_: SubtleApi, algorithm: Dynamic, key: CryptoKey, data: Dynamic| -> RhaiResult<Array> {
                let out = crypto::decrypt(&to_json(&algorithm)?, &key, &bytes(&data, "data")?)
                    .map_err(crypto_err)?;
                Ok(byte_array(&out))
            },
        );
}

/// `crypto::getRandomValues`、`crypto::randomUUID` 与 `crypto::subtle`
pub(super) fn module(random: &Arc<dyn RandomSource>) -> Module {
    let mut module = Module::new();
    module.set_var("subtle", SubtleApi);

    let source = Arc::clone(random);
    module.set_native_fn("getRandomValues", move |array: Array| -> RhaiResult<Array> {
        let values = crypto::get_random_values(source.as_ref(), array.len()).map_err(crypto_err)?;
        Ok(byte_array(&values))
    });

    let source = Arc::clone(random);
    module.set_native_fn("randomUUID", move || -> RhaiResult<String> {
        Ok(crypto::random_uuid(source.as_ref()))
    });

    finish(module)
}
