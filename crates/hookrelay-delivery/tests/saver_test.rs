//! Persistence writer behaviour under concurrent producers.

use anyhow::Result;
use hookrelay_delivery::Saver;

#[tokio::test]
async fn concurrent_producers_never_interleave_lines() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("saved.txt");
    let saver = Saver::open(&path).await?;

    let mut producers = Vec::new();
    for producer in 0..8 {
        let handle = saver.handle();
        producers.push(tokio::spawn(async move {
            for n in 0..100 {
                let pad = "x".repeat(512);
                let line = format!(r#"{{"producer":{producer},"n":{n},"pad":"{pad}"}}"#);
                handle.save(line)?;
                tokio::task::yield_now().await;
            }
            hookrelay_delivery::Result::Ok(())
        }));
    }
    for producer in producers {
        producer.await??;
    }

    assert_eq!(saver.stop_and_wait().await?, 800);

    let contents = tokio::fs::read_to_string(&path).await?;
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 800);

    // Per-producer order is preserved.
    let mut next = [0_u64; 8];
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line)?;
        let producer = value["producer"].as_u64().unwrap_or(u64::MAX) as usize;
        let n = value["n"].as_u64().unwrap_or(u64::MAX);
        assert_eq!(n, next[producer]);
        next[producer] += 1;
    }
    Ok(())
}

#[tokio::test]
async fn reopening_appends_to_existing_content() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("saved.txt");

    let first = Saver::open(&path).await?;
    first.save("one")?;
    first.stop_and_wait().await?;

    let second = Saver::open(&path).await?;
    second.save("two")?;
    second.stop_and_wait().await?;

    assert_eq!(tokio::fs::read_to_string(&path).await?, "one\ntwo\n");
    Ok(())
}
