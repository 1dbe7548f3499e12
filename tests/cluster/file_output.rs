// Splitting against real files: a minimal disk-backed segment output
// driving the same rotation machinery the in-memory fakes exercise.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use mkmux::{
    ClusterElement, ClusterHelper, MuxConfig, SegmentOutput, SplitKind, SplitPoint, TrackType,
};

use crate::util::{key_packet, standalone_cluster, FakeSource};

const MS: i64 = 1_000_000;

struct FileOutput {
    dir: PathBuf,
    file: File,
    file_num: u32,
    written: u64,
}

impl FileOutput {
    fn create(dir: PathBuf) -> io::Result<FileOutput> {
        let file = File::create(dir.join("out-001.mkv"))?;
        Ok(FileOutput {
            dir,
            file,
            file_num: 1,
            written: 0,
        })
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl SegmentOutput for FileOutput {
    fn position(&mut self) -> u64 {
        self.written
    }

    fn file_num(&self) -> u32 {
        self.file_num
    }

    fn finish_file(&mut self) -> anyhow::Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn create_next_file(&mut self) -> anyhow::Result<()> {
        self.file_num += 1;
        self.file = File::create(self.dir.join(format!("out-{:03}.mkv", self.file_num)))?;
        self.written = 0;
        Ok(())
    }

    fn new_cluster(&mut self) -> Box<dyn ClusterElement> {
        standalone_cluster(false)
    }
}

#[test]
fn a_split_run_produces_separate_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut ch = ClusterHelper::new(MuxConfig::default());
    ch.set_output(Box::new(
        FileOutput::create(dir.path().to_path_buf()).unwrap(),
    ));
    ch.add_split_point(SplitPoint::new(30_000 * MS, SplitKind::Timecode, true));
    let src = FakeSource::new(1, TrackType::Audio);

    ch.add_packet(key_packet(&src, 1_000 * MS, 256)).unwrap();
    ch.add_packet(key_packet(&src, 31_000 * MS, 256)).unwrap();
    ch.render().unwrap();

    // One rendered cluster per file: the header allowance plus the frame
    // and its key-frame framing.
    let expected = 21 + 256 + 10;
    let first = std::fs::metadata(dir.path().join("out-001.mkv")).unwrap().len();
    let second = std::fs::metadata(dir.path().join("out-002.mkv")).unwrap().len();
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(ch.bytes_in_file(), expected as i64);
}
