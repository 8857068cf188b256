//! PRIVMSG routing to channels, users and services.

use super::core::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::state::ConnectionKind;
use async_trait::async_trait;
use lantern_proto::Message;
use tracing::trace;

/// Handler for PRIVMSG command.
pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        // PRIVMSG <target>{,<target>} :<text>
        let targets = msg
            .arg(0)
            .filter(|t| !t.is_empty())
            .ok_or(HandlerError::NoRecipient)?;
        let text = msg
            .arg(1)
            .filter(|t| !t.is_empty())
            .ok_or(HandlerError::NoTextToSend)?;

        let prefix = ctx.client.prefix();
        for target in targets.split(',').filter(|t| !t.is_empty()) {
            let out = Message::new("PRIVMSG", [target])
                .with_trailing(text)
                .with_prefix(prefix.clone());
            if let Err(err) = route(ctx, target, out) {
                if let Some(reply) = err.to_irc_reply(ctx.server_name(), &ctx.nick(), "PRIVMSG") {
                    ctx.send(reply);
                }
            }
        }
        Ok(())
    }
}

fn route(ctx: &Context<'_>, target: &str, out: Message) -> HandlerResult {
    if target.starts_with('#') || target.starts_with('&') {
        let channel = ctx
            .hub
            .channels
            .get(target)
            .ok_or_else(|| HandlerError::NoSuchNick(target.to_string()))?;
        let delivered = channel
            .speak(ctx.client, &out)
            .map_err(|error| HandlerError::channel(channel.name(), error))?;
        trace!(channel = %channel.name(), delivered, "Channel message");
        return Ok(());
    }

    let recipient = ctx
        .hub
        .connections
        .find_by_common_name(target)
        .filter(|conn| conn.kind() != ConnectionKind::ServerLink)
        .ok_or_else(|| HandlerError::NoSuchNick(target.to_string()))?;
    recipient.send(out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::Registry;
    use crate::state::{Client, Connection, Hub};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Harness {
        hub: Arc<Hub>,
        registry: Registry,
    }

    impl Harness {
        fn new() -> Self {
            let config = "[server]\nname = \"irc.test\"\n[services]\nnicks = [\"HelpServ\"]";
            Self {
                hub: Hub::new(Config::parse(config).unwrap()),
                registry: Registry::new(),
            }
        }

        async fn user(&self, nick: &str) -> (Arc<Client>, mpsc::Receiver<Message>) {
            let (tx, mut rx) = mpsc::channel(128);
            let client = self.hub.add_client("10.0.0.1:5000".parse().unwrap(), tx);
            self.send(&client, &format!("NICK {nick}")).await;
            self.send(&client, &format!("USER {nick} 0 * :{nick}")).await;
            while rx.try_recv().is_ok() {}
            (client, rx)
        }

        async fn send(&self, client: &Arc<Client>, line: &str) {
            let ctx = Context::new(&self.hub, client);
            self.registry
                .dispatch(&ctx, &Message::parse(line).unwrap())
                .await
                .unwrap();
        }
    }

    fn lines(rx: &mut mpsc::Receiver<Message>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg.to_string());
        }
        out
    }

    #[tokio::test]
    async fn private_messages_reach_the_nick() {
        let h = Harness::new();
        let (alice, mut arx) = h.user("alice").await;
        let (_bob, mut brx) = h.user("bob").await;

        h.send(&alice, "PRIVMSG BOB :hi there").await;
        assert_eq!(lines(&mut brx), vec![":alice!~alice@10.0.0.1 PRIVMSG BOB :hi there"]);
        assert!(lines(&mut arx).is_empty());
    }

    #[tokio::test]
    async fn channel_messages_skip_the_sender() {
        let h = Harness::new();
        let (alice, mut arx) = h.user("alice").await;
        let (bob, mut brx) = h.user("bob").await;
        h.send(&alice, "JOIN #x").await;
        h.send(&bob, "JOIN #x").await;
        lines(&mut arx);
        lines(&mut brx);

        h.send(&bob, "PRIVMSG #x :hello").await;
        assert_eq!(lines(&mut arx), vec![":bob!~bob@10.0.0.1 PRIVMSG #x :hello"]);
        assert!(lines(&mut brx).is_empty());
    }

    #[tokio::test]
    async fn errors_per_target() {
        let h = Harness::new();
        let (alice, mut rx) = h.user("alice").await;
        let (bob, _brx) = h.user("bob").await;
        h.send(&bob, "JOIN #quiet").await;
        h.send(&alice, "JOIN #quiet").await;
        h.hub
            .channels
            .get("#quiet")
            .unwrap()
            .mute(alice.id())
            .unwrap();
        lines(&mut rx);

        h.send(&alice, "PRIVMSG").await;
        h.send(&alice, "PRIVMSG bob").await;
        h.send(&alice, "PRIVMSG ghost,#quiet,HelpServ :x").await;
        assert_eq!(
            lines(&mut rx),
            vec![
                ":irc.test 411 alice :No recipient given (PRIVMSG)",
                ":irc.test 412 alice :No text to send",
                ":irc.test 401 alice ghost :No such nick/channel",
                ":irc.test 404 alice #quiet :Cannot send to channel",
            ]
        );
    }
}
