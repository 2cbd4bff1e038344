use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use rxtap::{
    radiotap::split_output, Band, ChannelSpec, ChannelTable, Encoding, FramePool, HeapAllocator,
    HookConfig, HtFlagsPolicy, MonitorHook, ReceiveStatus, HEADER_LEN,
};
use rxtap_tools::{
    pcap::{GLOBAL_HEADER_LEN, RECORD_HEADER_LEN},
    read_records, replay, PcapSink, PcapWriter, ReplayRecord, ToolConfig,
};

/// Writer whose bytes stay readable after the sink is moved into the hook
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Split a pcap byte stream into its record payloads
fn pcap_records(data: &[u8]) -> Vec<&[u8]> {
    let mut records = Vec::new();
    let mut offset = GLOBAL_HEADER_LEN;
    while offset < data.len() {
        let incl = u32::from_le_bytes(data[offset + 8..offset + 12].try_into().unwrap()) as usize;
        let start = offset + RECORD_HEADER_LEN;
        records.push(&data[start..start + incl]);
        offset = start + incl;
    }
    records
}

fn ht_status(timestamp: u64) -> ReceiveStatus {
    ReceiveStatus {
        timestamp,
        channel_spec: ChannelSpec::new(Band::FiveGhz, 36),
        encoding: Encoding::Ht,
        ht_flags: 0x01 | 0x08,
        mcs_index: 7,
        data_rate: 0,
        signal_power: -55,
        noise_power: -90,
    }
}

#[test]
fn replay_writes_decodable_pcap() {
    let lines: Vec<String> = (0..3u64)
        .map(|i| {
            let record = ReplayRecord::new(ht_status(1000 + i), &[0x88, 0x41, i as u8]);
            serde_json::to_string(&record).unwrap()
        })
        .collect();
    let records = read_records(Cursor::new(lines.join("\n"))).unwrap();

    let out = SharedBuf::default();
    let sink = PcapSink::new(PcapWriter::new(out.clone(), 65535).unwrap());
    let hook = MonitorHook::new(HookConfig::default(), ChannelTable, HeapAllocator, sink)
        .unwrap();

    let summary = replay(&hook, &records).unwrap();
    assert_eq!(summary.forwarded, 3);

    hook.sink().flush().unwrap();
    let pcap = out.bytes();
    assert_eq!(&pcap[20..24], &127u32.to_le_bytes());

    let frames = pcap_records(&pcap);
    assert_eq!(frames.len(), 3);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.len(), HEADER_LEN + 3);
        let (header, payload) = split_output(frame).unwrap();
        assert_eq!(header.tsf, 1000 + i as u64);
        assert_eq!(header.channel_freq, 5180);
        assert!(header.is_5ghz());
        assert_eq!(header.mcs.index, 7);
        assert!(header.mcs.short_gi());
        assert_eq!(payload, &[0x88, 0x41, i as u8]);
    }
}

#[test]
fn pooled_replay_recycles_buffers() {
    let pool = Arc::new(FramePool::new(HEADER_LEN + 64, 1));
    let sink = PcapSink::new(PcapWriter::new(Vec::new(), 65535).unwrap())
        .with_pool(Arc::clone(&pool));
    let hook = MonitorHook::new(HookConfig::default(), ChannelTable, Arc::clone(&pool), sink)
        .unwrap();

    let records: Vec<ReplayRecord> = (0..10)
        .map(|i| ReplayRecord::new(ht_status(i), &[0u8; 32]))
        .collect();
    let summary = replay(&hook, &records).unwrap();

    // One buffer serves every frame because the sink hands it back after writing
    assert_eq!(summary.forwarded, 10);
    assert_eq!(summary.dropped(), 0);
    let stats = pool.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 9);
}

#[test]
fn config_drives_hook_policy() {
    let mut config = ToolConfig::from_toml(
        "[hook]\nmax_output_len = 1024\nht_flags_policy = \"single-dispatch\"\n",
    )
    .unwrap();
    assert!(config.validate().valid);
    assert_eq!(config.hook.ht_flags_policy, HtFlagsPolicy::SingleDispatch);

    config.hook.max_output_len = HEADER_LEN;
    let result = config.validate();
    assert!(!result.valid);
    assert!(MonitorHook::new(
        config.hook,
        ChannelTable,
        HeapAllocator,
        PcapSink::new(PcapWriter::new(Vec::new(), 65535).unwrap()),
    )
    .is_err());
}
