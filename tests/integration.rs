use bytes::{Buf, Bytes};
use tscodec::bitbuffer::{BitReader, Refill};
use tscodec::{
    create_decoder, create_encoder, CodecConfig, CodecError, DataType, Encoding, Page, PageReader,
    PageWriter, Value, ValueStatistics,
};

fn encode(data_type: DataType, encoding: &str, values: &[Value]) -> Bytes {
    encode_with(data_type, encoding, &CodecConfig::default(), values)
}

fn encode_with(
    data_type: DataType,
    encoding: &str,
    config: &CodecConfig,
    values: &[Value],
) -> Bytes {
    let mut enc = create_encoder(data_type, encoding, config).unwrap();
    for v in values {
        enc.encode(v).unwrap();
    }
    enc.flush().unwrap()
}

/// Round-trip: encode then decode, verify exact equality.
fn roundtrip(data_type: DataType, encoding: &str, values: &[Value]) -> Vec<Value> {
    let mut payload = encode(data_type, encoding, values);
    let mut dec = create_decoder(data_type, encoding).unwrap();
    let output = dec.decode_all(&mut payload).expect("decode failed");
    assert!(!payload.has_remaining(), "{encoding} left bytes behind");
    output
}

fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().copied().map(Value::Int32).collect()
}

fn doubles(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(Value::Double).collect()
}

#[test]
fn test_rle_int32_scenario() {
    let input = ints(&[100, 100, 101, 101, 101, 50]);
    assert_eq!(roundtrip(DataType::Int32, "RLE", &input), input);
}

#[test]
fn test_gorilla_double_scenario() {
    let input = doubles(&[1.5, 1.5, 2.25, 2.25]);
    assert_eq!(roundtrip(DataType::Double, "GORILLA", &input), input);

    let mut payload = encode(DataType::Double, "GORILLA", &input);
    // 4-byte count, then 64 + 1 + 28 + 1 = 94 bits padded to 12 bytes.
    assert_eq!(payload.len(), 16);
    assert_eq!(payload.get_u32(), 4);

    let mut r = BitReader::new(Refill::Lazy);
    assert_eq!(r.read_bits(64, &mut payload).unwrap(), 1.5f64.to_bits());
    assert!(!r.read_bit(&mut payload).unwrap(), "2nd value is one `0` bit");
    assert_eq!(r.read_bits(2, &mut payload).unwrap(), 0b11);
    let leading = r.read_bits(6, &mut payload).unwrap() as u32;
    let meaningful = r.read_bits(6, &mut payload).unwrap() as u32;
    let xor = r.read_bits(meaningful as u8, &mut payload).unwrap() << (64 - leading - meaningful);
    assert_eq!(xor, 1.5f64.to_bits() ^ 2.25f64.to_bits());
    assert!(!r.read_bit(&mut payload).unwrap(), "4th value is one `0` bit");
}

#[test]
fn test_gorilla_v2_same_values_different_framing() {
    let input = doubles(&[1.5, 1.5, 2.25, 2.25]);
    let v1 = encode(DataType::Double, "GORILLA", &input);
    let v2 = encode(DataType::Double, "GORILLA_V2", &input);
    // Varint count instead of a 4-byte count. The 94 bits end mid-byte, so
    // the padded partial byte is the terminator.
    assert_eq!(v2.len(), 1 + 12);
    assert_ne!(v1, v2);
    assert_eq!(roundtrip(DataType::Double, "GORILLA_V2", &input), input);

    // Pages written by one layout are not readable by the other.
    let mut dec = create_decoder(DataType::Double, "GORILLA_V2").unwrap();
    let mut payload = v1.clone();
    assert!(dec
        .decode_all(&mut payload)
        .map(|values| values != input)
        .unwrap_or(true));
}

#[test]
fn test_gorilla_v2_terminator_on_byte_boundary() {
    // 64 bits for the first value plus one bit per repeat.
    let aligned = doubles(&[21.5; 9]);
    let payload = encode(DataType::Double, "GORILLA_V2", &aligned);
    // 72 bits fill 9 bytes exactly, so an empty terminator byte follows.
    assert_eq!(payload.len(), 1 + 9 + 1);
    assert_eq!(payload[payload.len() - 1], 0);
    assert_eq!(roundtrip(DataType::Double, "GORILLA_V2", &aligned), aligned);

    let unaligned = doubles(&[21.5; 8]);
    let payload = encode(DataType::Double, "GORILLA_V2", &unaligned);
    assert_eq!(payload.len(), 1 + 9);
    assert_eq!(roundtrip(DataType::Double, "GORILLA_V2", &unaligned), unaligned);
}

#[test]
fn test_dispatch_rejection() {
    let config = CodecConfig::default();
    for (data_type, encoding) in [(DataType::Text, "GORILLA"), (DataType::Boolean, "TS_2DIFF")] {
        assert!(matches!(
            create_encoder(data_type, encoding, &config),
            Err(CodecError::UnsupportedTypeEncoding { .. })
        ));
        assert!(matches!(
            create_decoder(data_type, encoding),
            Err(CodecError::UnsupportedTypeEncoding { .. })
        ));
    }
    assert!(matches!(
        PageWriter::new(DataType::Text, "GORILLA", "SNAPPY", &config),
        Err(CodecError::UnsupportedTypeEncoding { .. })
    ));
    assert!(matches!(
        PageWriter::new(DataType::Double, "GORILLA", "BROTLI", &config),
        Err(CodecError::UnknownCompressor(_))
    ));
}

#[test]
fn test_empty_single_and_constant() {
    let config = CodecConfig::default();
    for data_type in DataType::ALL {
        let sample = match data_type {
            DataType::Boolean => Value::Boolean(true),
            DataType::Int32 => Value::Int32(-17),
            DataType::Int64 => Value::Int64(1 << 40),
            DataType::Float => Value::Float(0.1),
            DataType::Double => Value::Double(-273.15),
            DataType::Text => Value::from("sensor-7"),
        };
        for &encoding in data_type.supported_encodings() {
            let name = encoding.name();
            let empty = encode_with(data_type, name, &config, &[]);
            assert!(empty.is_empty(), "{data_type} {name}");
            assert!(roundtrip(data_type, name, &[]).is_empty());

            let single = vec![sample.clone()];
            assert_eq!(roundtrip(data_type, name, &single), single, "{data_type} {name}");

            let constant = vec![sample.clone(); 1_000];
            assert_eq!(roundtrip(data_type, name, &constant), constant, "{data_type} {name}");
        }
    }
}

#[test]
fn test_ts2diff_regular_timestamps_compress() {
    let input: Vec<Value> = (0..10_000)
        .map(|i| Value::Int64(1_609_459_200_000 + i * 1_000))
        .collect();
    let payload = encode(DataType::Int64, "TS_2DIFF", &input);
    // Each block of 8 costs a seed, a minimum and a zero width.
    assert!(payload.len() < input.len() * 3, "{} bytes", payload.len());
    assert_eq!(roundtrip(DataType::Int64, "TS_2DIFF", &input), input);
}

#[test]
fn test_ts2diff_fixed_point_doubles() {
    let config = CodecConfig::default().with_fixed_point_scale(1_000.0);
    let input = doubles(&[20.125, 20.5, 21.0, 19.875, -3.25]);
    let mut payload = encode_with(DataType::Double, "TS_2DIFF", &config, &input);
    let mut dec = create_decoder(DataType::Double, "TS_2DIFF").unwrap();
    assert_eq!(dec.decode_all(&mut payload).unwrap(), input);
}

#[test]
fn test_gorilla_integers() {
    let input: Vec<Value> = (0..300).map(|i| Value::Int64(1_000 + (i % 5))).collect();
    for encoding in ["GORILLA", "GORILLA_V2"] {
        assert_eq!(roundtrip(DataType::Int64, encoding, &input), input);
    }
    let input = ints(&[i32::MIN, -1, 0, 1, i32::MAX, i32::MAX]);
    for encoding in ["GORILLA", "GORILLA_V2"] {
        assert_eq!(roundtrip(DataType::Int32, encoding, &input), input);
    }
}

#[test]
fn test_rle_run_cap() {
    let config = CodecConfig::default().with_max_run_length(16);
    let input = vec![Value::Boolean(true); 100];
    let mut payload = encode_with(DataType::Boolean, "RLE", &config, &input);
    let mut dec = create_decoder(DataType::Boolean, "RLE").unwrap();
    assert_eq!(dec.decode_all(&mut payload).unwrap(), input);
}

#[test]
fn test_truncated_payloads_underflow() {
    let input: Vec<Value> = (0..200).map(|i| Value::Int64(i * i - 50 * i)).collect();
    for encoding in Encoding::ALL {
        let payload = encode(DataType::Int64, encoding.name(), &input);
        let mut truncated = payload.slice(..payload.len() - 2);
        let mut dec = create_decoder(DataType::Int64, encoding.name()).unwrap();
        let result = dec.decode_all(&mut truncated);
        assert_eq!(result, Err(CodecError::BufferUnderflow), "{encoding}");
    }
}

#[test]
fn test_page_scenario_with_snappy() {
    let mut writer =
        PageWriter::new(DataType::Double, "GORILLA", "SNAPPY", &CodecConfig::default()).unwrap();
    let points: Vec<(i64, Value)> = (0..2_000)
        .map(|i| (1_609_459_200_000 + i * 60_000, Value::Double(20.0 + (i % 10) as f64 * 0.5)))
        .collect();
    for (t, v) in &points {
        writer.write(*t, v).unwrap();
    }
    let page = writer.flush().unwrap();
    assert_eq!(page.point_count(), 2_000);

    match page.statistics.values() {
        Some(ValueStatistics::Double(s)) => {
            assert_eq!(s.min, 20.0);
            assert_eq!(s.max, 24.5);
            assert_eq!(s.first, 20.0);
            assert_eq!(s.last, 24.5);
            assert_eq!(s.sum, 200.0 * (20.0 + 24.5) * 5.0);
        }
        other => panic!("unexpected statistics {other:?}"),
    }
    assert_eq!(page.statistics.start_time(), Some(1_609_459_200_000));

    let restored = Page::from_bytes(page.to_bytes()).unwrap();
    assert_eq!(PageReader::new(&restored).unwrap().read_all().unwrap(), points);
}

#[test]
fn test_page_text_column() {
    let config = CodecConfig::default().with_time_encoding("PLAIN");
    let mut writer = PageWriter::new(DataType::Text, "PLAIN", "UNCOMPRESSED", &config).unwrap();
    let points = vec![
        (5, Value::from("boot")),
        (9, Value::from("")),
        (12, Value::from("shutdown")),
    ];
    for (t, v) in &points {
        writer.write(*t, v).unwrap();
    }
    let page = writer.flush().unwrap();
    assert_eq!(page.header.time_encoding, Encoding::Plain);
    assert_eq!(page.header.time_len, 24);
    let read: Result<Vec<_>, _> = PageReader::new(&page).unwrap().collect();
    assert_eq!(read.unwrap(), points);
}

#[test]
fn test_config_from_json() {
    let config: CodecConfig = serde_json::from_str(
        r#"{ "max_run_length": 1024, "time_encoding": "gorilla_v2" }"#,
    )
    .unwrap();
    config.validate().unwrap();
    let mut writer = PageWriter::new(DataType::Int32, "RLE", "snappy", &config).unwrap();
    writer.write(1, &Value::Int32(3)).unwrap();
    let page = writer.flush().unwrap();
    assert_eq!(page.header.time_encoding, Encoding::GorillaV2);

    let bad: CodecConfig = serde_json::from_str(r#"{ "max_run_length": 0 }"#).unwrap();
    assert!(matches!(
        PageWriter::new(DataType::Int32, "RLE", "snappy", &bad),
        Err(CodecError::InvalidConfig(_))
    ));
}
