//! Registration completion and the welcome burst (001-005 + MOTD).

use super::core::Context;
use crate::modes::{CHANNEL_MODE_LETTERS, USER_MODE_LETTERS};
use crate::state::{Connection, VERSION};
use lantern_proto::Response;
use tracing::info;

/// Fire the welcome burst if the client has just become registered.
///
/// Called after every NICK, USER and PASS. Returns `true` only for the one
/// call that actually sent the burst.
pub fn complete_registration(ctx: &Context<'_>) -> bool {
    if !ctx.client.is_registered() || !ctx.client.mark_welcomed() {
        return false;
    }

    let config = &ctx.hub.config;
    let server = ctx.server_name();
    let prefix = ctx.client.prefix().to_string();
    let created = ctx
        .hub
        .started_at
        .format("%a %b %d %Y at %H:%M:%S UTC")
        .to_string();

    ctx.numeric(Response::RPL_WELCOME, &[config.server.network.as_str(), prefix.as_str()]);
    ctx.numeric(Response::RPL_YOURHOST, &[server, VERSION]);
    ctx.numeric(Response::RPL_CREATED, &[created.as_str()]);
    ctx.numeric(
        Response::RPL_MYINFO,
        &[server, VERSION, USER_MODE_LETTERS, CHANNEL_MODE_LETTERS],
    );
    let nick = ctx.nick();
    ctx.send(
        ctx.hub
            .reply(Response::RPL_ISUPPORT, &[nick.as_str()])
            .with_args(isupport(ctx)),
    );

    send_motd(ctx);

    info!(
        uid = %ctx.client.id(),
        nick = %ctx.nick(),
        host = %ctx.client.info().hostname,
        "Client registered"
    );
    true
}

fn isupport(ctx: &Context<'_>) -> Vec<String> {
    let config = &ctx.hub.config;
    vec![
        format!("NETWORK={}", config.server.network),
        "CASEMAPPING=rfc1459".to_string(),
        "CHANTYPES=#&".to_string(),
        "PREFIX=(ov)@+".to_string(),
        "CHANMODES=bq,k,l,nrst".to_string(),
        format!("NICKLEN={}", config.nick.max_length),
        format!("CHANNELLEN={}", config.limits.channel_length),
    ]
}

fn send_motd(ctx: &Context<'_>) {
    let motd = &ctx.hub.config.motd;
    if motd.is_empty() {
        ctx.numeric(Response::ERR_NOMOTD, &[]);
        return;
    }
    ctx.numeric(Response::RPL_MOTDSTART, &[ctx.server_name()]);
    for line in motd {
        ctx.numeric(Response::RPL_MOTD, &[line.as_str()]);
    }
    ctx.numeric(Response::RPL_ENDOFMOTD, &[]);
}
