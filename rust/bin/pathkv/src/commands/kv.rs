//! `pathkv get|put|upsert|delete`.

use std::io::Write;

use anyhow::Result;
use pathkv_kv::{Client, Context, KeyValueList, kv};

/// Output format for fetched records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Output {
    /// `key<TAB>value`, one record per line.
    Table,
    Json,
}

pub fn get(client: &Client, ctx: &Context, raw: &str, output: Output, out: &mut impl Write) -> Result<()> {
    let path = client.parse(raw)?;
    let records = client.fetch(ctx, &path)?;
    render(&records, output, out)
}

pub fn put(client: &Client, ctx: &Context, args: &[String], out: &mut impl Write) -> Result<()> {
    let entries = kv(args)?;
    client.put(ctx, &entries)?;
    writeln!(out, "appended {}", entries.len())?;
    Ok(())
}

pub fn upsert(client: &Client, ctx: &Context, args: &[String], out: &mut impl Write) -> Result<()> {
    let entries = kv(args)?;
    client.upsert(ctx, &entries)?;
    writeln!(out, "upserted {}", entries.len())?;
    Ok(())
}

pub fn delete(client: &Client, ctx: &Context, raw: &str, out: &mut impl Write) -> Result<()> {
    let path = client.parse(raw)?;
    let removed = client.delete(ctx, &path)?;
    writeln!(out, "deleted {}", removed)?;
    Ok(())
}

fn render(records: &KeyValueList, output: Output, out: &mut impl Write) -> Result<()> {
    match output {
        Output::Table => {
            for record in records {
                writeln!(out, "{}\t{}", record.path, record.value)?;
            }
        }
        Output::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathkv_kv::MemoryStore;

    fn run<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn put_get_delete_flow() {
        let client = Client::new(MemoryStore::new());
        let ctx = Context::background();

        let out = run(|o| put(&client, &ctx, &args(&["users/1", "alice", "users/2", "bob", "admins/1", "root"]), o));
        assert_eq!(out, "appended 3\n");

        let out = run(|o| get(&client, &ctx, "users/*", Output::Table, o));
        assert_eq!(out, "users/1\talice\nusers/2\tbob\n");

        let out = run(|o| delete(&client, &ctx, "users/*", o));
        assert_eq!(out, "deleted 2\n");
        let out = run(|o| delete(&client, &ctx, "users/*", o));
        assert_eq!(out, "deleted 0\n");
    }

    #[test]
    fn json_output() {
        let client = Client::new(MemoryStore::new());
        let ctx = Context::background();
        run(|o| upsert(&client, &ctx, &args(&["k", "v"]), o));

        let out = run(|o| get(&client, &ctx, "k", Output::Json, o));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["path"], "k");
        assert_eq!(parsed[0]["value"], "v");
    }

    #[test]
    fn odd_put_arguments_fail() {
        let client = Client::new(MemoryStore::new());
        let mut buf = Vec::new();
        let err = put(&client, &Context::background(), &args(&["lonely"]), &mut buf).unwrap_err();
        assert!(err.to_string().contains("key/value pairs"));
        assert!(buf.is_empty());
    }
}
