// ===============================
// src/recorder.rs
// ===============================
//
// JSONL recorder for every inbound event and outbound command:
// - one `Record` per line, appended
// - BufWriter, flushed every second and every 1000 records
// - parent directory created if missing
// - on a write error the file is reopened once; if that fails too the
//   record is dropped (trading never waits on the recorder)
//
// ENV: `RECORD_FILE=/path/to/session.jsonl` (or --record-file) to enable.
//
use std::path::Path;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Record;

const FLUSH_EVERY_N_RECORDS: u32 = 1000;

async fn open_writer(path: &str) -> std::io::Result<BufWriter<fs::File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(BufWriter::new(file))
}

async fn write_line(writer: &mut BufWriter<fs::File>, line: &[u8]) -> std::io::Result<()> {
    writer.write_all(line).await?;
    writer.write_all(b"\n").await
}

pub async fn run(mut rx: mpsc::Receiver<Record>, path: String) {
    let mut writer = match open_writer(&path).await {
        Ok(w) => w,
        Err(e) => {
            error!(?e, %path, "recorder: open failed, recording disabled");
            return;
        }
    };
    info!(%path, "recorder: started");

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_last_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_rec = rx.recv() => {
                let Some(rec) = maybe_rec else {
                    let _ = writer.flush().await;
                    info!("recorder: channel closed, stopped");
                    break;
                };
                let line = match serde_json::to_vec(&rec) {
                    Ok(s) => s,
                    Err(e) => {
                        error!(?e, "recorder: serialize error, skip record");
                        continue;
                    }
                };

                if let Err(e) = write_line(&mut writer, &line).await {
                    error!(?e, "recorder: write failed, attempting reopen");
                    match open_writer(&path).await {
                        Ok(w) => writer = w,
                        Err(e2) => {
                            error!(?e2, "recorder: reopen failed, drop record");
                            continue;
                        }
                    }
                    if let Err(e2) = write_line(&mut writer, &line).await {
                        error!(?e2, "recorder: write failed again after reopen, drop record");
                        continue;
                    }
                }

                since_last_flush += 1;
                if since_last_flush >= FLUSH_EVERY_N_RECORDS {
                    let _ = writer.flush().await;
                    since_last_flush = 0;
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Command, Entry, Event};

    #[tokio::test]
    async fn writes_one_json_line_per_record() {
        let path = std::env::temp_dir()
            .join(format!("etf_mm_rec_{}", std::process::id()))
            .join("session.jsonl");
        let path_str = path.to_string_lossy().to_string();
        let _ = std::fs::remove_file(&path);

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(run(rx, path_str.clone()));
        tx.send(Record::now(Entry::Event(Event::Error { id: 0, message: "hello".into() }))).await.unwrap();
        tx.send(Record::now(Entry::Command(Command::Cancel { id: 4 }))).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: Record = serde_json::from_str(lines[1]).unwrap();
        assert!(matches!(back.entry, Entry::Command(Command::Cancel { id: 4 })));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
