//! # Token Flows Across Nodes
//!
//! Tokens minted outside the receiving launcher (by a generator run, by
//! another node's keystore, by a misconfigured issuer) presented to the
//! built-in storage node.

#[cfg(test)]
mod tests {
    use node_runtime::context::ROLE_ADMIN;
    use node_runtime::generator::TokenIdentifier;
    use node_runtime::{
        nodes, AuthenticationDependency, AuthenticationGenerator, Configuration, CoreContext,
        Launcher,
    };
    use serde_json::json;
    use shared_bus::MessageBus;
    use shared_crypto::{
        Algorithm, Keystore, KeystoreSet, KeystoreSettings, ManualClock, SecretFactory,
        SecuritySettings, TokenFactory,
    };
    use shared_types::token::PROPERTY_ROLE;
    use shared_types::{InboundMessage, ResponseStatus, Token};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn config() -> Configuration {
        let mut config = Configuration::default();
        config.system.handler_instances = 2;
        config.system.shutdown_timeout_ms = 1_000;
        config.system.shutdown_poll_ms = 10;
        config
    }

    fn put(key: &str) -> InboundMessage {
        InboundMessage::new("put")
            .with_field("key", key)
            .with_field("value", json!(true))
    }

    async fn launch_with(tokens: TokenFactory) -> Launcher {
        let config = Arc::new(config());
        let context = CoreContext::new(
            MessageBus::new("storage.node"),
            Arc::clone(&config),
            Arc::new(tokens),
        );
        let launcher = Launcher::with_context(context, nodes::builtin());
        launcher.start(None).await.unwrap();
        launcher
    }

    #[tokio::test]
    async fn test_signature_token_from_remote_keystore() {
        let dir = tempfile::tempdir().unwrap();
        let private = KeystoreSettings {
            private_key: Some(dir.path().join("issuer.key")),
            public_key: Some(dir.path().join("issuer.pub")),
        };
        let issuer_keys = Keystore::generate("issuer", Algorithm::Ed25519).unwrap();
        issuer_keys.save(&private).unwrap();

        // The issuing node holds the private key.
        let issuer = TokenFactory::new(b"issuer-secret", &SecuritySettings::default())
            .unwrap()
            .with_keystores(Arc::new(KeystoreSet::new().with(issuer_keys)));
        let token = issuer
            .sign(Token::new("storage.node", issuer.now() + 60), "issuer")
            .unwrap();

        // The storage node only knows the public key.
        let mut config = config();
        config.system.secret = SecretFactory::generate(32);
        config.security.keystores.insert(
            "issuer".into(),
            KeystoreSettings {
                private_key: None,
                public_key: private.public_key.clone(),
            },
        );
        let launcher = Launcher::new(config, nodes::builtin()).unwrap();
        launcher.start(None).await.unwrap();
        let ctx = launcher.context();

        let reply = ctx.request("storage", put("signed").with_token(token.clone())).await.unwrap();
        assert!(reply.is(ResponseStatus::Accepted));

        let mut swapped = token;
        swapped.add_property("alias", "unknown");
        let reply = ctx.request("storage", put("swapped").with_token(swapped)).await.unwrap();
        assert!(reply.is(ResponseStatus::Unauthorized));

        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_token_expires_on_storage_node() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let tokens = TokenFactory::new(b"node-secret", &SecuritySettings::default())
            .unwrap()
            .with_clock(clock.clone());
        let token = tokens.hmac(Token::new("auth", tokens.now() + 60)).unwrap();

        let launcher = launch_with(tokens).await;
        let ctx = launcher.context();

        let reply = ctx.request("storage", put("before").with_token(token.clone())).await.unwrap();
        assert!(reply.is(ResponseStatus::Accepted));

        clock.advance(61);
        let reply = ctx.request("storage", put("after").with_token(token)).await.unwrap();
        assert!(reply.is(ResponseStatus::Unauthorized));

        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_role_required_for_clear() {
        let tokens = TokenFactory::new(b"node-secret", &SecuritySettings::default()).unwrap();
        let expiry = tokens.now() + 60;
        let user = tokens.hmac(Token::new("auth", expiry)).unwrap();
        let admin = tokens
            .hmac(Token::new("auth", expiry).with_property(PROPERTY_ROLE, ROLE_ADMIN))
            .unwrap();

        let launcher = launch_with(tokens).await;
        let ctx = launcher.context();
        ctx.request("storage", put("a").with_token(user.clone())).await.unwrap();

        let reply = ctx
            .request("storage", InboundMessage::new("clear").with_token(user))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Unauthorized));

        let reply = ctx
            .request("storage", InboundMessage::new("clear").with_token(admin))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Accepted));

        let reply = ctx.request("storage", InboundMessage::new("size")).await.unwrap();
        assert_eq!(reply.get("size"), Some(&json!(0)));

        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_untrusted_hmac_algorithm_rejected() {
        let weak = SecuritySettings {
            hmac_algorithm: "HmacSHA256".into(),
            ..SecuritySettings::default()
        };
        let issuer = TokenFactory::new(b"shared", &weak).unwrap();
        let token = issuer.issue("auth").unwrap();

        let launcher =
            launch_with(TokenFactory::new(b"shared", &SecuritySettings::default()).unwrap()).await;
        let reply = launcher
            .context()
            .request("storage", put("a").with_token(token))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Unauthorized));

        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_generated_token_accepted_by_issuer_secret() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("authentication.toml"), "").unwrap();
        std::fs::write(dir.path().join("client.toml"), "").unwrap();

        let mut tokens = BTreeMap::new();
        tokens.insert(
            "storage_token".to_string(),
            TokenIdentifier {
                service: "authentication".into(),
                secret: "client_secret".into(),
            },
        );
        let mut dependencies = BTreeMap::new();
        dependencies.insert(
            "authentication".to_string(),
            AuthenticationDependency {
                secrets: vec!["client_secret".into()],
                ..AuthenticationDependency::default()
            },
        );
        dependencies.insert(
            "client".to_string(),
            AuthenticationDependency {
                tokens,
                ..AuthenticationDependency::default()
            },
        );

        AuthenticationGenerator::new(dir.path(), SecuritySettings::default(), dependencies)
            .all()
            .unwrap();

        let read = |name: &str| -> toml::Table {
            std::fs::read_to_string(dir.path().join(name))
                .unwrap()
                .parse()
                .unwrap()
        };
        let authentication = read("authentication.toml");
        let client = read("client.toml");
        let token: Token = client["storage_token"].clone().try_into().unwrap();
        assert_eq!(token.domain, "client");

        let mut config = config();
        config.system.secret = authentication["client_secret"].as_str().unwrap().to_string();
        let launcher = Launcher::new(config, nodes::builtin()).unwrap();
        launcher.start(None).await.unwrap();

        let reply = launcher
            .context()
            .request("storage", put("from-client").with_token(token))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Accepted));

        launcher.shutdown().await.unwrap();
    }
}
