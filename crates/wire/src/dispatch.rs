//! Command dispatch
//!
//! A static table maps upper-cased command names to handlers
//! `(engine, namespace, args, connection) → Reply`. The table is the
//! shared entry point for the RESP listener and the HTTP control
//! surface; [`dispatch_pipeline`] backs the batch endpoint.
//!
//! `PING` works before authentication; `AUTH` flips the connection's
//! flag; everything else answers `NOAUTH` until authenticated.

use crate::conn::ConnState;
use crate::reply::Reply;
use brine_core::{Error, Result, StreamId};
use brine_engine::{Engine, SetOptions};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;

/// Everything a handler may touch
pub struct CommandContext<'a> {
    /// The engine serving this connection's namespace
    pub engine: &'a Engine,
    /// The namespace every keyspace operation applies to
    pub namespace: &'a str,
    /// The calling connection's state
    pub conn: &'a mut ConnState,
}

type Handler = fn(&mut CommandContext<'_>, &[Vec<u8>]) -> Result<Reply>;

/// Commands that mutate the keyspace; the server forwards these to the
/// replication observer after a successful dispatch.
const WRITE_COMMANDS: &[&str] = &[
    "SET", "SETNX", "SETEX", "GETDEL", "APPEND", "INCR", "INCRBY", "DECR", "DECRBY", "MSET",
    "HSET", "HMSET", "HDEL", "HINCRBY", "LPUSH", "RPUSH", "LPOP", "RPOP", "LSET", "LTRIM",
    "SADD", "SREM", "SPOP", "ZADD", "ZREM", "XADD", "DEL", "RENAME", "EXPIRE", "EXPIREAT",
    "PERSIST",
];

/// True when `name` (upper-cased) mutates the keyspace
pub fn is_write_command(name: &str) -> bool {
    WRITE_COMMANDS.contains(&name)
}

static COMMANDS: Lazy<HashMap<&'static str, Handler>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Handler> = HashMap::new();
    // Strings
    table.insert("GET", cmd_get);
    table.insert("SET", cmd_set);
    table.insert("SETNX", cmd_setnx);
    table.insert("SETEX", cmd_setex);
    table.insert("GETDEL", cmd_getdel);
    table.insert("APPEND", cmd_append);
    table.insert("STRLEN", cmd_strlen);
    table.insert("GETRANGE", cmd_getrange);
    table.insert("INCR", cmd_incr);
    table.insert("INCRBY", cmd_incrby);
    table.insert("DECR", cmd_decr);
    table.insert("DECRBY", cmd_decrby);
    table.insert("MGET", cmd_mget);
    table.insert("MSET", cmd_mset);
    // Hashes
    table.insert("HGET", cmd_hget);
    table.insert("HSET", cmd_hset);
    table.insert("HMSET", cmd_hmset);
    table.insert("HMGET", cmd_hmget);
    table.insert("HGETALL", cmd_hgetall);
    table.insert("HDEL", cmd_hdel);
    table.insert("HEXISTS", cmd_hexists);
    table.insert("HLEN", cmd_hlen);
    table.insert("HKEYS", cmd_hkeys);
    table.insert("HVALS", cmd_hvals);
    table.insert("HINCRBY", cmd_hincrby);
    // Lists
    table.insert("LPUSH", cmd_lpush);
    table.insert("RPUSH", cmd_rpush);
    table.insert("LPOP", cmd_lpop);
    table.insert("RPOP", cmd_rpop);
    table.insert("LLEN", cmd_llen);
    table.insert("LINDEX", cmd_lindex);
    table.insert("LSET", cmd_lset);
    table.insert("LRANGE", cmd_lrange);
    table.insert("LTRIM", cmd_ltrim);
    // Sets
    table.insert("SADD", cmd_sadd);
    table.insert("SREM", cmd_srem);
    table.insert("SMEMBERS", cmd_smembers);
    table.insert("SISMEMBER", cmd_sismember);
    table.insert("SCARD", cmd_scard);
    table.insert("SPOP", cmd_spop);
    table.insert("SRANDMEMBER", cmd_srandmember);
    // Sorted sets
    table.insert("ZADD", cmd_zadd);
    table.insert("ZRANGE", cmd_zrange);
    table.insert("ZREVRANGE", cmd_zrevrange);
    table.insert("ZRANGEBYSCORE", cmd_zrangebyscore);
    table.insert("ZSCORE", cmd_zscore);
    table.insert("ZCARD", cmd_zcard);
    table.insert("ZREM", cmd_zrem);
    // Streams
    table.insert("XADD", cmd_xadd);
    table.insert("XRANGE", cmd_xrange);
    table.insert("XLEN", cmd_xlen);
    // Keyspace meta
    table.insert("TYPE", cmd_type);
    table.insert("RENAME", cmd_rename);
    table.insert("EXISTS", cmd_exists);
    table.insert("DEL", cmd_del);
    table.insert("KEYS", cmd_keys);
    table.insert("SCAN", cmd_scan);
    // TTL
    table.insert("EXPIRE", cmd_expire);
    table.insert("EXPIREAT", cmd_expireat);
    table.insert("TTL", cmd_ttl);
    table.insert("PTTL", cmd_pttl);
    table.insert("PERSIST", cmd_persist);
    // Pub/sub
    table.insert("PUBLISH", cmd_publish);
    table.insert("SUBSCRIBE", cmd_subscribe);
    table.insert("UNSUBSCRIBE", cmd_unsubscribe);
    table.insert("PSUBSCRIBE", cmd_psubscribe);
    table.insert("PUNSUBSCRIBE", cmd_punsubscribe);
    // Server / compatibility
    table.insert("ECHO", cmd_echo);
    table.insert("SELECT", cmd_noop_ok);
    table.insert("CLIENT", cmd_noop_ok);
    table.insert("CONFIG", cmd_config);
    table.insert("COMMAND", cmd_command);
    table.insert("DEBUG", cmd_noop_ok);
    table.insert("INFO", cmd_info);
    table.insert("TIME", cmd_time);
    table
});

/// Dispatch one command against an engine.
///
/// This is the function the HTTP collaborator calls directly — it never
/// touches sockets and never panics on client input.
pub fn dispatch(engine: &Engine, namespace: &str, argv: &[Vec<u8>], conn: &mut ConnState) -> Reply {
    let Some(name) = argv.first() else {
        return Reply::Error("ERR empty command".to_string());
    };
    let name = String::from_utf8_lossy(name).to_uppercase();
    let args = &argv[1..];
    let mut ctx = CommandContext {
        engine,
        namespace,
        conn,
    };

    // PING answers before auth so clients can probe liveness
    let result = match name.as_str() {
        "PING" => cmd_ping(&mut ctx, args),
        "AUTH" => cmd_auth(&mut ctx, args),
        "QUIT" => {
            ctx.conn.closing = true;
            Ok(Reply::ok())
        }
        _ if !ctx.conn.authenticated => {
            return Reply::Error("NOAUTH Authentication required.".to_string());
        }
        _ => match COMMANDS.get(name.as_str()) {
            Some(handler) => handler(&mut ctx, args),
            None => Err(Error::invalid_op(format!("unknown command '{}'", name))),
        },
    };

    match result {
        Ok(reply) => reply,
        Err(e) => Reply::from_error(&e),
    }
}

/// Dispatch a batch, returning one reply per command
pub fn dispatch_pipeline(
    engine: &Engine,
    namespace: &str,
    batch: &[Vec<Vec<u8>>],
    conn: &mut ConnState,
) -> Vec<Reply> {
    batch
        .iter()
        .map(|argv| dispatch(engine, namespace, argv, conn))
        .collect()
}

// =============================================================================
// Argument helpers
// =============================================================================

fn expect_len(args: &[Vec<u8>], n: usize, cmd: &str) -> Result<()> {
    if args.len() != n {
        return Err(wrong_arity(cmd));
    }
    Ok(())
}

fn expect_at_least(args: &[Vec<u8>], n: usize, cmd: &str) -> Result<()> {
    if args.len() < n {
        return Err(wrong_arity(cmd));
    }
    Ok(())
}

fn wrong_arity(cmd: &str) -> Error {
    Error::invalid_op(format!(
        "wrong number of arguments for '{}' command",
        cmd.to_lowercase()
    ))
}

fn as_str(arg: &[u8]) -> Result<&str> {
    std::str::from_utf8(arg).map_err(|_| Error::invalid_op("invalid UTF-8 argument"))
}

fn parse_i64(arg: &[u8]) -> Result<i64> {
    as_str(arg)?
        .parse()
        .map_err(|_| Error::invalid_op("value is not an integer or out of range"))
}

fn parse_u64(arg: &[u8]) -> Result<u64> {
    as_str(arg)?
        .parse()
        .map_err(|_| Error::invalid_op("value is not an integer or out of range"))
}

fn parse_score(arg: &[u8]) -> Result<f64> {
    match as_str(arg)? {
        "+inf" | "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        s => s
            .parse()
            .map_err(|_| Error::invalid_op("value is not a valid float")),
    }
}

/// Integer-valued scores print without a decimal part, like the protocol
/// clients expect (`1`, not `1.0`).
fn fmt_score(score: f64) -> String {
    format!("{}", score)
}

fn parse_stream_bound(arg: &[u8]) -> Result<StreamId> {
    match arg {
        b"-" => Ok(StreamId::MIN),
        b"+" => Ok(StreamId::MAX),
        other => as_str(other)?.parse(),
    }
}

fn rows_to_flat(rows: Vec<(Vec<u8>, f64)>, with_scores: bool) -> Reply {
    let mut out = Vec::with_capacity(rows.len() * if with_scores { 2 } else { 1 });
    for (member, score) in rows {
        out.push(Reply::Bulk(member));
        if with_scores {
            out.push(Reply::Bulk(fmt_score(score).into_bytes()));
        }
    }
    Reply::Array(out)
}

// =============================================================================
// Strings
// =============================================================================

fn cmd_get(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "get")?;
    Ok(Reply::bulk_or_null(ctx.engine.get(ctx.namespace, &args[0])?))
}

fn cmd_set(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "set")?;
    let mut opts = SetOptions::default();
    let mut i = 2;
    while i < args.len() {
        match as_str(&args[i])?.to_uppercase().as_str() {
            "EX" => {
                let secs = parse_u64(args.get(i + 1).ok_or_else(|| wrong_arity("set"))?)?;
                opts.ttl = Some(Duration::from_secs(secs));
                i += 2;
            }
            "PX" => {
                let ms = parse_u64(args.get(i + 1).ok_or_else(|| wrong_arity("set"))?)?;
                opts.ttl = Some(Duration::from_millis(ms));
                i += 2;
            }
            "NX" => {
                opts.nx = true;
                i += 1;
            }
            "XX" => {
                opts.xx = true;
                i += 1;
            }
            other => {
                return Err(Error::invalid_op(format!("syntax error near '{}'", other)));
            }
        }
    }
    let written = ctx
        .engine
        .set(ctx.namespace, &args[0], args[1].clone(), opts)?;
    Ok(if written { Reply::ok() } else { Reply::NullBulk })
}

fn cmd_setnx(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "setnx")?;
    let written = ctx.engine.setnx(ctx.namespace, &args[0], args[1].clone())?;
    Ok(Reply::Int(written as i64))
}

fn cmd_setex(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 3, "setex")?;
    let secs = parse_u64(&args[1])?;
    ctx.engine
        .setex(ctx.namespace, &args[0], secs, args[2].clone())?;
    Ok(Reply::ok())
}

fn cmd_getdel(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "getdel")?;
    Ok(Reply::bulk_or_null(
        ctx.engine.getdel(ctx.namespace, &args[0])?,
    ))
}

fn cmd_append(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "append")?;
    Ok(Reply::Int(
        ctx.engine.append(ctx.namespace, &args[0], &args[1])? as i64,
    ))
}

fn cmd_strlen(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "strlen")?;
    Ok(Reply::Int(ctx.engine.strlen(ctx.namespace, &args[0])? as i64))
}

fn cmd_getrange(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 3, "getrange")?;
    let (start, end) = (parse_i64(&args[1])?, parse_i64(&args[2])?);
    Ok(Reply::Bulk(
        ctx.engine.getrange(ctx.namespace, &args[0], start, end)?,
    ))
}

fn cmd_incr(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "incr")?;
    Ok(Reply::Int(ctx.engine.incr_by(ctx.namespace, &args[0], 1)?))
}

fn cmd_incrby(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "incrby")?;
    let by = parse_i64(&args[1])?;
    Ok(Reply::Int(ctx.engine.incr_by(ctx.namespace, &args[0], by)?))
}

fn cmd_decr(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "decr")?;
    Ok(Reply::Int(ctx.engine.decr_by(ctx.namespace, &args[0], 1)?))
}

fn cmd_decrby(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "decrby")?;
    let by = parse_i64(&args[1])?;
    Ok(Reply::Int(ctx.engine.decr_by(ctx.namespace, &args[0], by)?))
}

fn cmd_mget(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 1, "mget")?;
    let values = ctx.engine.mget(ctx.namespace, args)?;
    Ok(Reply::Array(
        values.into_iter().map(Reply::bulk_or_null).collect(),
    ))
}

fn cmd_mset(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(wrong_arity("mset"));
    }
    let pairs = args
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    ctx.engine.mset(ctx.namespace, pairs)?;
    Ok(Reply::ok())
}

// =============================================================================
// Hashes
// =============================================================================

fn cmd_hget(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "hget")?;
    Ok(Reply::bulk_or_null(
        ctx.engine.hget(ctx.namespace, &args[0], &args[1])?,
    ))
}

fn hset_pairs(args: &[Vec<u8>], cmd: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return Err(wrong_arity(cmd));
    }
    Ok(args[1..]
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

fn cmd_hset(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    let pairs = hset_pairs(args, "hset")?;
    Ok(Reply::Int(
        ctx.engine.hset(ctx.namespace, &args[0], pairs)? as i64,
    ))
}

fn cmd_hmset(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    let pairs = hset_pairs(args, "hmset")?;
    ctx.engine.hset(ctx.namespace, &args[0], pairs)?;
    Ok(Reply::ok())
}

fn cmd_hmget(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "hmget")?;
    let values = ctx.engine.hmget(ctx.namespace, &args[0], &args[1..])?;
    Ok(Reply::Array(
        values.into_iter().map(Reply::bulk_or_null).collect(),
    ))
}

fn cmd_hgetall(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "hgetall")?;
    let pairs = ctx.engine.hgetall(ctx.namespace, &args[0])?;
    let mut out = Vec::with_capacity(pairs.len() * 2);
    for (field, value) in pairs {
        out.push(Reply::Bulk(field));
        out.push(Reply::Bulk(value));
    }
    Ok(Reply::Array(out))
}

fn cmd_hdel(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "hdel")?;
    Ok(Reply::Int(
        ctx.engine.hdel(ctx.namespace, &args[0], &args[1..])? as i64,
    ))
}

fn cmd_hexists(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "hexists")?;
    Ok(Reply::Int(
        ctx.engine.hexists(ctx.namespace, &args[0], &args[1])? as i64,
    ))
}

fn cmd_hlen(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "hlen")?;
    Ok(Reply::Int(ctx.engine.hlen(ctx.namespace, &args[0])? as i64))
}

fn cmd_hkeys(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "hkeys")?;
    let keys = ctx.engine.hkeys(ctx.namespace, &args[0])?;
    Ok(Reply::Array(keys.into_iter().map(Reply::Bulk).collect()))
}

fn cmd_hvals(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "hvals")?;
    let vals = ctx.engine.hvals(ctx.namespace, &args[0])?;
    Ok(Reply::Array(vals.into_iter().map(Reply::Bulk).collect()))
}

fn cmd_hincrby(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 3, "hincrby")?;
    let by = parse_i64(&args[2])?;
    Ok(Reply::Int(
        ctx.engine.hincrby(ctx.namespace, &args[0], &args[1], by)?,
    ))
}

// =============================================================================
// Lists
// =============================================================================

fn cmd_lpush(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "lpush")?;
    Ok(Reply::Int(
        ctx.engine.lpush(ctx.namespace, &args[0], args[1..].to_vec())? as i64,
    ))
}

fn cmd_rpush(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "rpush")?;
    Ok(Reply::Int(
        ctx.engine.rpush(ctx.namespace, &args[0], args[1..].to_vec())? as i64,
    ))
}

fn cmd_lpop(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "lpop")?;
    Ok(Reply::bulk_or_null(ctx.engine.lpop(ctx.namespace, &args[0])?))
}

fn cmd_rpop(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "rpop")?;
    Ok(Reply::bulk_or_null(ctx.engine.rpop(ctx.namespace, &args[0])?))
}

fn cmd_llen(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "llen")?;
    Ok(Reply::Int(ctx.engine.llen(ctx.namespace, &args[0])? as i64))
}

fn cmd_lindex(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "lindex")?;
    let index = parse_i64(&args[1])?;
    Ok(Reply::bulk_or_null(
        ctx.engine.lindex(ctx.namespace, &args[0], index)?,
    ))
}

fn cmd_lset(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 3, "lset")?;
    let index = parse_i64(&args[1])?;
    ctx.engine
        .lset(ctx.namespace, &args[0], index, args[2].clone())?;
    Ok(Reply::ok())
}

fn cmd_lrange(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 3, "lrange")?;
    let (start, stop) = (parse_i64(&args[1])?, parse_i64(&args[2])?);
    let items = ctx.engine.lrange(ctx.namespace, &args[0], start, stop)?;
    Ok(Reply::Array(items.into_iter().map(Reply::Bulk).collect()))
}

fn cmd_ltrim(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 3, "ltrim")?;
    let (start, stop) = (parse_i64(&args[1])?, parse_i64(&args[2])?);
    ctx.engine.ltrim(ctx.namespace, &args[0], start, stop)?;
    Ok(Reply::ok())
}

// =============================================================================
// Sets
// =============================================================================

fn cmd_sadd(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "sadd")?;
    Ok(Reply::Int(
        ctx.engine.sadd(ctx.namespace, &args[0], args[1..].to_vec())? as i64,
    ))
}

fn cmd_srem(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "srem")?;
    Ok(Reply::Int(
        ctx.engine.srem(ctx.namespace, &args[0], &args[1..])? as i64,
    ))
}

fn cmd_smembers(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "smembers")?;
    let members = ctx.engine.smembers(ctx.namespace, &args[0])?;
    Ok(Reply::Array(members.into_iter().map(Reply::Bulk).collect()))
}

fn cmd_sismember(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "sismember")?;
    Ok(Reply::Int(
        ctx.engine.sismember(ctx.namespace, &args[0], &args[1])? as i64,
    ))
}

fn cmd_scard(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "scard")?;
    Ok(Reply::Int(ctx.engine.scard(ctx.namespace, &args[0])? as i64))
}

fn cmd_spop(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "spop")?;
    Ok(Reply::bulk_or_null(ctx.engine.spop(ctx.namespace, &args[0])?))
}

fn cmd_srandmember(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "srandmember")?;
    Ok(Reply::bulk_or_null(
        ctx.engine.srandmember(ctx.namespace, &args[0])?,
    ))
}

// =============================================================================
// Sorted sets
// =============================================================================

fn cmd_zadd(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return Err(wrong_arity("zadd"));
    }
    let mut pairs = Vec::with_capacity((args.len() - 1) / 2);
    for pair in args[1..].chunks(2) {
        pairs.push((parse_score(&pair[0])?, pair[1].clone()));
    }
    Ok(Reply::Int(
        ctx.engine.zadd(ctx.namespace, &args[0], pairs)? as i64,
    ))
}

fn with_scores_flag(args: &[Vec<u8>], at: usize, cmd: &str) -> Result<bool> {
    match args.get(at) {
        None => Ok(false),
        Some(flag) if as_str(flag)?.eq_ignore_ascii_case("WITHSCORES") => Ok(true),
        Some(_) => Err(Error::invalid_op(format!(
            "syntax error in '{}' command",
            cmd
        ))),
    }
}

fn cmd_zrange(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 3, "zrange")?;
    let (start, stop) = (parse_i64(&args[1])?, parse_i64(&args[2])?);
    let with_scores = with_scores_flag(args, 3, "zrange")?;
    let rows = ctx.engine.zrange(ctx.namespace, &args[0], start, stop)?;
    Ok(rows_to_flat(rows, with_scores))
}

fn cmd_zrevrange(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 3, "zrevrange")?;
    let (start, stop) = (parse_i64(&args[1])?, parse_i64(&args[2])?);
    let with_scores = with_scores_flag(args, 3, "zrevrange")?;
    let rows = ctx.engine.zrevrange(ctx.namespace, &args[0], start, stop)?;
    Ok(rows_to_flat(rows, with_scores))
}

fn cmd_zrangebyscore(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 3, "zrangebyscore")?;
    let (min, max) = (parse_score(&args[1])?, parse_score(&args[2])?);
    let with_scores = with_scores_flag(args, 3, "zrangebyscore")?;
    let rows = ctx.engine.zrangebyscore(ctx.namespace, &args[0], min, max)?;
    Ok(rows_to_flat(rows, with_scores))
}

fn cmd_zscore(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "zscore")?;
    Ok(
        match ctx.engine.zscore(ctx.namespace, &args[0], &args[1])? {
            Some(score) => Reply::Bulk(fmt_score(score).into_bytes()),
            None => Reply::NullBulk,
        },
    )
}

fn cmd_zcard(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "zcard")?;
    Ok(Reply::Int(ctx.engine.zcard(ctx.namespace, &args[0])? as i64))
}

fn cmd_zrem(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 2, "zrem")?;
    Ok(Reply::Int(
        ctx.engine.zrem(ctx.namespace, &args[0], &args[1..])? as i64,
    ))
}

// =============================================================================
// Streams
// =============================================================================

fn cmd_xadd(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(wrong_arity("xadd"));
    }
    let id = match args[1].as_slice() {
        b"*" => None,
        explicit => Some(as_str(explicit)?.parse()?),
    };
    let fields = args[2..]
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    let assigned = ctx.engine.xadd(ctx.namespace, &args[0], id, fields)?;
    Ok(Reply::Bulk(assigned.to_string().into_bytes()))
}

fn cmd_xrange(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 3, "xrange")?;
    let from = parse_stream_bound(&args[1])?;
    let to = parse_stream_bound(&args[2])?;
    let count = match args.get(3) {
        None => None,
        Some(kw) if as_str(kw)?.eq_ignore_ascii_case("COUNT") => {
            Some(parse_u64(args.get(4).ok_or_else(|| wrong_arity("xrange"))?)? as usize)
        }
        Some(_) => return Err(Error::invalid_op("syntax error in 'xrange' command")),
    };
    let entries = ctx.engine.xrange(ctx.namespace, &args[0], from, to, count)?;
    Ok(Reply::Array(
        entries
            .into_iter()
            .map(|entry| {
                let mut fields = Vec::with_capacity(entry.fields.len() * 2);
                for (f, v) in entry.fields {
                    fields.push(Reply::Bulk(f));
                    fields.push(Reply::Bulk(v));
                }
                Reply::Array(vec![
                    Reply::Bulk(entry.id.to_string().into_bytes()),
                    Reply::Array(fields),
                ])
            })
            .collect(),
    ))
}

fn cmd_xlen(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "xlen")?;
    Ok(Reply::Int(ctx.engine.xlen(ctx.namespace, &args[0])? as i64))
}

// =============================================================================
// Keyspace meta & TTL
// =============================================================================

fn cmd_type(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "type")?;
    Ok(Reply::Simple(
        ctx.engine
            .type_of(ctx.namespace, &args[0])?
            .unwrap_or("none")
            .to_string(),
    ))
}

fn cmd_rename(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "rename")?;
    ctx.engine.rename(ctx.namespace, &args[0], &args[1])?;
    Ok(Reply::ok())
}

fn cmd_exists(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 1, "exists")?;
    Ok(Reply::Int(ctx.engine.exists(ctx.namespace, args)? as i64))
}

fn cmd_del(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 1, "del")?;
    Ok(Reply::Int(ctx.engine.del(ctx.namespace, args)? as i64))
}

fn cmd_keys(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "keys")?;
    let keys = ctx.engine.keys(ctx.namespace, &args[0])?;
    Ok(Reply::Array(keys.into_iter().map(Reply::Bulk).collect()))
}

fn cmd_scan(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 1, "scan")?;
    let cursor = parse_u64(&args[0])?;
    let mut pattern: Vec<u8> = b"*".to_vec();
    let mut count = 10usize;
    let mut i = 1;
    while i < args.len() {
        match as_str(&args[i])?.to_uppercase().as_str() {
            "MATCH" => {
                pattern = args.get(i + 1).ok_or_else(|| wrong_arity("scan"))?.clone();
                i += 2;
            }
            "COUNT" => {
                count = parse_u64(args.get(i + 1).ok_or_else(|| wrong_arity("scan"))?)? as usize;
                i += 2;
            }
            _ => return Err(Error::invalid_op("syntax error in 'scan' command")),
        }
    }
    let (next, page) = ctx.engine.scan(ctx.namespace, cursor, &pattern, count)?;
    Ok(Reply::Array(vec![
        Reply::Bulk(next.to_string().into_bytes()),
        Reply::Array(page.into_iter().map(Reply::Bulk).collect()),
    ]))
}

fn cmd_expire(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "expire")?;
    let secs = parse_u64(&args[1])?;
    let applied = ctx
        .engine
        .expire(ctx.namespace, &args[0], Duration::from_secs(secs))?;
    Ok(Reply::Int(applied as i64))
}

fn cmd_expireat(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "expireat")?;
    let at = parse_u64(&args[1])?;
    let applied = ctx.engine.expireat(ctx.namespace, &args[0], at)?;
    Ok(Reply::Int(applied as i64))
}

fn cmd_ttl(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "ttl")?;
    Ok(Reply::Int(ctx.engine.ttl(ctx.namespace, &args[0])?))
}

fn cmd_pttl(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "pttl")?;
    Ok(Reply::Int(ctx.engine.pttl(ctx.namespace, &args[0])?))
}

fn cmd_persist(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "persist")?;
    let stripped = ctx.engine.persist(ctx.namespace, &args[0])?;
    Ok(Reply::Int(stripped as i64))
}

// =============================================================================
// Pub/sub
// =============================================================================

fn cmd_publish(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 2, "publish")?;
    let channel = as_str(&args[0])?;
    let receivers = ctx.engine.publish(channel, &args[1], None);
    Ok(Reply::Int(receivers as i64))
}

fn cmd_subscribe(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 1, "subscribe")?;
    let id = ctx.conn.ensure_subscriber(ctx.engine);
    let mut replies = Vec::with_capacity(args.len());
    for channel in args {
        let channel = as_str(channel)?.to_string();
        ctx.engine.subscribe_channel(id, &channel);
        ctx.conn.channels.insert(channel.clone());
        replies.push(Reply::Array(vec![
            Reply::Bulk(b"subscribe".to_vec()),
            Reply::Bulk(channel.into_bytes()),
            Reply::Int(ctx.conn.subscription_count() as i64),
        ]));
    }
    Ok(Reply::Multi(replies))
}

fn cmd_unsubscribe(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    let targets: Vec<String> = if args.is_empty() {
        ctx.conn.channels.iter().cloned().collect()
    } else {
        args.iter()
            .map(|a| as_str(a).map(str::to_string))
            .collect::<Result<_>>()?
    };
    let mut replies = Vec::new();
    for channel in targets {
        if let Some(id) = ctx.conn.subscriber {
            ctx.engine.unsubscribe_channel(id, &channel);
        }
        ctx.conn.channels.remove(&channel);
        replies.push(Reply::Array(vec![
            Reply::Bulk(b"unsubscribe".to_vec()),
            Reply::Bulk(channel.into_bytes()),
            Reply::Int(ctx.conn.subscription_count() as i64),
        ]));
    }
    if replies.is_empty() {
        replies.push(Reply::Array(vec![
            Reply::Bulk(b"unsubscribe".to_vec()),
            Reply::NullBulk,
            Reply::Int(0),
        ]));
    }
    Ok(Reply::Multi(replies))
}

fn cmd_psubscribe(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_at_least(args, 1, "psubscribe")?;
    let id = ctx.conn.ensure_subscriber(ctx.engine);
    let mut replies = Vec::with_capacity(args.len());
    for pattern in args {
        let pattern = as_str(pattern)?.to_string();
        ctx.engine.subscribe_pattern(id, &pattern);
        ctx.conn.patterns.insert(pattern.clone());
        replies.push(Reply::Array(vec![
            Reply::Bulk(b"psubscribe".to_vec()),
            Reply::Bulk(pattern.into_bytes()),
            Reply::Int(ctx.conn.subscription_count() as i64),
        ]));
    }
    Ok(Reply::Multi(replies))
}

fn cmd_punsubscribe(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    let targets: Vec<String> = if args.is_empty() {
        ctx.conn.patterns.iter().cloned().collect()
    } else {
        args.iter()
            .map(|a| as_str(a).map(str::to_string))
            .collect::<Result<_>>()?
    };
    let mut replies = Vec::new();
    for pattern in targets {
        if let Some(id) = ctx.conn.subscriber {
            ctx.engine.unsubscribe_pattern(id, &pattern);
        }
        ctx.conn.patterns.remove(&pattern);
        replies.push(Reply::Array(vec![
            Reply::Bulk(b"punsubscribe".to_vec()),
            Reply::Bulk(pattern.into_bytes()),
            Reply::Int(ctx.conn.subscription_count() as i64),
        ]));
    }
    if replies.is_empty() {
        replies.push(Reply::Array(vec![
            Reply::Bulk(b"punsubscribe".to_vec()),
            Reply::NullBulk,
            Reply::Int(0),
        ]));
    }
    Ok(Reply::Multi(replies))
}

// =============================================================================
// Server / compatibility
// =============================================================================

fn cmd_ping(_ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    Ok(match args.first() {
        Some(msg) => Reply::Bulk(msg.clone()),
        None => Reply::Simple("PONG".to_string()),
    })
}

fn cmd_auth(ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "auth")?;
    let password = as_str(&args[0])?;
    if ctx.conn.try_auth(password) {
        Ok(Reply::ok())
    } else {
        Ok(Reply::Error("ERR invalid password".to_string()))
    }
}

fn cmd_echo(_ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    expect_len(args, 1, "echo")?;
    Ok(Reply::Bulk(args[0].clone()))
}

fn cmd_noop_ok(_ctx: &mut CommandContext<'_>, _args: &[Vec<u8>]) -> Result<Reply> {
    Ok(Reply::ok())
}

fn cmd_config(_ctx: &mut CommandContext<'_>, args: &[Vec<u8>]) -> Result<Reply> {
    // CONFIG GET answers an empty array, CONFIG SET pretends to succeed;
    // both exist only so stock clients can connect.
    match args.first().map(|a| a.to_ascii_uppercase()) {
        Some(sub) if sub == b"GET" => Ok(Reply::Array(vec![])),
        _ => Ok(Reply::ok()),
    }
}

fn cmd_command(_ctx: &mut CommandContext<'_>, _args: &[Vec<u8>]) -> Result<Reply> {
    Ok(Reply::Array(vec![]))
}

fn cmd_info(ctx: &mut CommandContext<'_>, _args: &[Vec<u8>]) -> Result<Reply> {
    Ok(Reply::Bulk(
        ctx.engine.stats().render_info().into_bytes(),
    ))
}

fn cmd_time(_ctx: &mut CommandContext<'_>, _args: &[Vec<u8>]) -> Result<Reply> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Reply::Array(vec![
        Reply::Bulk(now.as_secs().to_string().into_bytes()),
        Reply::Bulk(now.subsec_micros().to_string().into_bytes()),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_engine::EngineConfig;

    const NS: &str = "default";

    fn argv(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    fn run(engine: &Engine, conn: &mut ConnState, parts: &[&str]) -> Reply {
        dispatch(engine, NS, &argv(parts), conn)
    }

    #[test]
    fn test_set_get_flow() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        assert_eq!(run(&engine, &mut conn, &["SET", "foo", "bar"]), Reply::ok());
        assert_eq!(
            run(&engine, &mut conn, &["GET", "foo"]),
            Reply::Bulk(b"bar".to_vec())
        );
        assert_eq!(run(&engine, &mut conn, &["GET", "nope"]), Reply::NullBulk);
    }

    #[test]
    fn test_set_options_and_nx_miss_returns_null() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        assert_eq!(
            run(&engine, &mut conn, &["SET", "k", "v", "EX", "100"]),
            Reply::ok()
        );
        // NX against an existing key: null, not an error
        assert_eq!(
            run(&engine, &mut conn, &["SET", "k", "w", "NX"]),
            Reply::NullBulk
        );
        match run(&engine, &mut conn, &["TTL", "k"]) {
            Reply::Int(ttl) => assert!(ttl > 0 && ttl <= 100),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        match run(&engine, &mut conn, &["FLY", "me"]) {
            Reply::Error(msg) => assert!(msg.contains("unknown command 'FLY'")),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_auth_gate() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(Some("pw".into()));

        // PING is allowed pre-auth
        assert_eq!(
            run(&engine, &mut conn, &["PING"]),
            Reply::Simple("PONG".into())
        );
        // Everything else is gated
        match run(&engine, &mut conn, &["GET", "k"]) {
            Reply::Error(msg) => assert!(msg.starts_with("NOAUTH")),
            other => panic!("unexpected reply {:?}", other),
        }
        // Wrong password
        match run(&engine, &mut conn, &["AUTH", "nope"]) {
            Reply::Error(msg) => assert!(msg.contains("invalid password")),
            other => panic!("unexpected reply {:?}", other),
        }
        // Correct password unlocks
        assert_eq!(run(&engine, &mut conn, &["AUTH", "pw"]), Reply::ok());
        assert_eq!(run(&engine, &mut conn, &["GET", "k"]), Reply::NullBulk);
    }

    #[test]
    fn test_wrongtype_maps_to_wrongtype_error() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        run(&engine, &mut conn, &["HSET", "h", "f", "v"]);
        match run(&engine, &mut conn, &["GET", "h"]) {
            Reply::Error(msg) => assert!(msg.starts_with("WRONGTYPE")),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_zrange_withscores_flat_array() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        run(
            &engine,
            &mut conn,
            &["ZADD", "Z", "1", "a", "2", "b", "3", "c"],
        );
        let reply = run(&engine, &mut conn, &["ZRANGE", "Z", "0", "-1", "WITHSCORES"]);
        assert_eq!(
            reply,
            Reply::Array(vec![
                Reply::Bulk(b"a".to_vec()),
                Reply::Bulk(b"1".to_vec()),
                Reply::Bulk(b"b".to_vec()),
                Reply::Bulk(b"2".to_vec()),
                Reply::Bulk(b"c".to_vec()),
                Reply::Bulk(b"3".to_vec()),
            ])
        );
        let by_score = run(&engine, &mut conn, &["ZRANGEBYSCORE", "Z", "2", "3"]);
        assert_eq!(
            by_score,
            Reply::Array(vec![
                Reply::Bulk(b"b".to_vec()),
                Reply::Bulk(b"c".to_vec()),
            ])
        );
    }

    #[test]
    fn test_zscore_formats_integer_scores_plain() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        run(&engine, &mut conn, &["ZADD", "Z", "5", "a"]);
        assert_eq!(
            run(&engine, &mut conn, &["ZSCORE", "Z", "a"]),
            Reply::Bulk(b"5".to_vec())
        );
        run(&engine, &mut conn, &["ZADD", "Z", "1.5", "b"]);
        assert_eq!(
            run(&engine, &mut conn, &["ZSCORE", "Z", "b"]),
            Reply::Bulk(b"1.5".to_vec())
        );
    }

    #[test]
    fn test_subscribe_reply_shape() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        let reply = run(&engine, &mut conn, &["SUBSCRIBE", "a", "b"]);
        match reply {
            Reply::Multi(items) => {
                assert_eq!(items.len(), 2);
                match &items[1] {
                    Reply::Array(parts) => {
                        assert_eq!(parts[0], Reply::Bulk(b"subscribe".to_vec()));
                        assert_eq!(parts[1], Reply::Bulk(b"b".to_vec()));
                        assert_eq!(parts[2], Reply::Int(2));
                    }
                    other => panic!("unexpected item {:?}", other),
                }
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert!(conn.pending_receiver.is_some());
        assert_eq!(conn.subscription_count(), 2);
    }

    #[test]
    fn test_publish_counts_subscribers() {
        let engine = Engine::new(EngineConfig::default());
        let mut sub_conn = ConnState::new(None);
        run(&engine, &mut sub_conn, &["SUBSCRIBE", "news"]);
        let mut pub_conn = ConnState::new(None);
        assert_eq!(
            run(&engine, &mut pub_conn, &["PUBLISH", "news", "hi"]),
            Reply::Int(1)
        );
        assert_eq!(
            run(&engine, &mut pub_conn, &["PUBLISH", "other", "hi"]),
            Reply::Int(0)
        );
    }

    #[test]
    fn test_compat_noops() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        assert_eq!(run(&engine, &mut conn, &["SELECT", "2"]), Reply::ok());
        assert_eq!(run(&engine, &mut conn, &["CLIENT", "SETNAME", "x"]), Reply::ok());
        assert_eq!(
            run(&engine, &mut conn, &["CONFIG", "GET", "maxmemory"]),
            Reply::Array(vec![])
        );
        assert_eq!(run(&engine, &mut conn, &["COMMAND"]), Reply::Array(vec![]));
        assert_eq!(
            run(&engine, &mut conn, &["ECHO", "hello"]),
            Reply::Bulk(b"hello".to_vec())
        );
    }

    #[test]
    fn test_time_returns_secs_and_micros() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        match run(&engine, &mut conn, &["TIME"]) {
            Reply::Array(parts) => {
                assert_eq!(parts.len(), 2);
                match &parts[0] {
                    Reply::Bulk(secs) => {
                        let s: u64 = std::str::from_utf8(secs).unwrap().parse().unwrap();
                        assert!(s > 1_600_000_000);
                    }
                    other => panic!("unexpected part {:?}", other),
                }
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_info_contains_sections() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        match run(&engine, &mut conn, &["INFO"]) {
            Reply::Bulk(body) => {
                let text = String::from_utf8(body).unwrap();
                assert!(text.contains("# Server"));
                assert!(text.contains("# Memory"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_quit_marks_closing() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        assert_eq!(run(&engine, &mut conn, &["QUIT"]), Reply::ok());
        assert!(conn.closing);
    }

    #[test]
    fn test_pipeline_returns_per_command_results() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        let batch = vec![
            argv(&["SET", "a", "1"]),
            argv(&["INCR", "a"]),
            argv(&["GET", "a"]),
            argv(&["BOGUS"]),
        ];
        let replies = dispatch_pipeline(&engine, NS, &batch, &mut conn);
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0], Reply::ok());
        assert_eq!(replies[1], Reply::Int(2));
        assert_eq!(replies[2], Reply::Bulk(b"2".to_vec()));
        assert!(matches!(replies[3], Reply::Error(_)));
    }

    #[test]
    fn test_is_write_command() {
        assert!(is_write_command("SET"));
        assert!(is_write_command("DEL"));
        assert!(is_write_command("EXPIRE"));
        assert!(!is_write_command("GET"));
        assert!(!is_write_command("PING"));
    }

    #[test]
    fn test_scan_command_shape() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        for i in 0..5 {
            run(&engine, &mut conn, &["SET", &format!("k{}", i), "v"]);
        }
        match run(&engine, &mut conn, &["SCAN", "0", "COUNT", "100"]) {
            Reply::Array(parts) => {
                assert_eq!(parts[0], Reply::Bulk(b"0".to_vec()));
                match &parts[1] {
                    Reply::Array(keys) => assert_eq!(keys.len(), 5),
                    other => panic!("unexpected part {:?}", other),
                }
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_xadd_xrange_shapes() {
        let engine = Engine::new(EngineConfig::default());
        let mut conn = ConnState::new(None);
        let id = match run(&engine, &mut conn, &["XADD", "st", "*", "f", "v"]) {
            Reply::Bulk(id) => String::from_utf8(id).unwrap(),
            other => panic!("unexpected reply {:?}", other),
        };
        assert!(id.contains('-'));
        match run(&engine, &mut conn, &["XRANGE", "st", "-", "+"]) {
            Reply::Array(entries) => assert_eq!(entries.len(), 1),
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(run(&engine, &mut conn, &["XLEN", "st"]), Reply::Int(1));
    }
}
