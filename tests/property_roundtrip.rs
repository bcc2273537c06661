//! Property-based round trips through both LZ4 wire formats
//!
//! Random payloads, codec parameters and block caps, written through a
//! package and read back through the load path.

use lz4pack::{
    compress_buffer, decompress_buffer, LoadStatus, Lz4FileInfo, Lz4Package, Lz4Params,
    MemoryStream, PackMethod, PackageBuilder, PackageConfig, PkgStream,
};
use proptest::prelude::*;

fn method_strategy() -> impl Strategy<Value = PackMethod> {
    prop_oneof![Just(PackMethod::Lz4Frame), Just(PackMethod::Lz4Block)]
}

fn params_strategy() -> impl Strategy<Value = Lz4Params> {
    (-3i32..16, 0u8..10, any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(level, id, independent, checksum, auto_flush)| {
            Lz4Params::with_level(level)
                .block_size_id(id)
                .block_independence(independent)
                .content_checksum(checksum)
                .auto_flush(auto_flush)
        },
    )
}

// Mixes compressible runs with noise so both literal and match paths are hit
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..6000),
        (any::<u8>(), 0usize..20_000).prop_map(|(b, n)| vec![b; n]),
        prop::collection::vec(0u8..4, 0..12_000),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_package_round_trip(
        data in payload_strategy(),
        method in method_strategy(),
        params in params_strategy(),
        block_cap in prop_oneof![1usize..64, 200usize..300, 1000usize..70_000],
        read_chunk in 1usize..5000,
    ) {
        let config = PackageConfig {
            block_size_cap: block_cap,
            read_chunk_size: read_chunk,
            ..Default::default()
        };

        let mut writer = PackageBuilder::new()
            .config(config.clone())
            .build(MemoryStream::new("pkg"))
            .unwrap();
        let mut input = MemoryStream::from_bytes("in", data.clone());
        writer
            .add_entry(&Lz4FileInfo::new("payload", method, params), &mut input)
            .unwrap();
        let size = writer.save_package().unwrap();
        writer.close().unwrap();

        let entry = writer.entry_by_name("payload").unwrap();
        prop_assert_eq!(entry.info().unpacked_size, data.len() as u64);
        prop_assert_eq!(entry.info().packed_size, size);
        let bytes = writer.into_stream().into_bytes();
        prop_assert_eq!(bytes.len() as u64, size);

        let mut reader = PackageBuilder::new()
            .config(config)
            .build(MemoryStream::from_bytes("pkg", bytes))
            .unwrap();
        let mut names = Vec::new();
        prop_assert_eq!(reader.load_package(&mut names, None).unwrap(), LoadStatus::Loaded);
        prop_assert_eq!(reader.entry_by_name(&names[0]).unwrap().info().pack_method, Some(method));

        let mut out = MemoryStream::new("out");
        reader.extract_file(&names[0], &mut out).unwrap();
        prop_assert_eq!(out.as_bytes(), data.as_slice());
    }

    #[test]
    fn prop_buffer_helpers_round_trip(
        data in payload_strategy(),
        method in method_strategy(),
        params in params_strategy(),
    ) {
        let config = PackageConfig::default();
        let mut meta = Lz4FileInfo::new("buf", method, params);
        let packed = compress_buffer(&mut meta, &data, &config).unwrap();
        prop_assert_eq!(meta.file_info.packed_size, packed.len() as u64);

        let mut sniffed = Lz4FileInfo::default();
        let plain = decompress_buffer(&mut sniffed, &packed, &config).unwrap();
        prop_assert_eq!(sniffed.file_info.pack_method, Some(method));
        prop_assert_eq!(plain, data);
    }

    #[test]
    fn prop_cursor_tracks_stream_length(
        payloads in prop::collection::vec(payload_strategy(), 1..5),
        method in method_strategy(),
    ) {
        let mut package = Lz4Package::new(MemoryStream::new("pkg"));
        for (i, payload) in payloads.iter().enumerate() {
            let mut input = MemoryStream::from_bytes("in", payload.clone());
            package
                .add_entry(
                    &Lz4FileInfo::new(format!("e{}", i), method, Lz4Params::default()),
                    &mut input,
                )
                .unwrap();
            prop_assert_eq!(package.cursor(), package.stream().length().unwrap());
        }
        prop_assert_eq!(package.entries().len(), payloads.len());
    }
}

#[test]
fn test_empty_entry_loads_as_empty() {
    for method in [PackMethod::Lz4Frame, PackMethod::Lz4Block] {
        let mut writer = Lz4Package::new(MemoryStream::new("pkg"));
        let mut input = MemoryStream::new("empty");
        writer
            .add_entry(&Lz4FileInfo::new("empty", method, Lz4Params::default()), &mut input)
            .unwrap();
        writer.save_package().unwrap();
        let bytes = writer.into_stream().into_bytes();
        assert!(bytes.len() >= 4);

        let mut reader = Lz4Package::new(MemoryStream::from_bytes("pkg", bytes));
        let mut names = Vec::new();
        assert_eq!(reader.load_package(&mut names, None).unwrap(), LoadStatus::Loaded);
        let mut out = MemoryStream::new("out");
        reader.extract_file(&names[0], &mut out).unwrap();
        assert!(out.as_bytes().is_empty());
    }
}
