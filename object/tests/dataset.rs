//! End-to-end header parsing over hand-built files.

use voxel_core::Tag;
use voxel_dictionary::tags;
use voxel_object::FileDecoder;

const PREAMBLE: usize = 128;

fn file_with_meta(ts_uid: &str) -> Vec<u8> {
    let mut uid = ts_uid.as_bytes().to_vec();
    if uid.len() % 2 != 0 {
        uid.push(0);
    }
    let mut out = vec![0u8; PREAMBLE];
    out.extend_from_slice(b"DICM");
    out.extend_from_slice(&[0x02, 0x00, 0x10, 0x00, b'U', b'I']);
    out.extend_from_slice(&(uid.len() as u16).to_le_bytes());
    out.extend_from_slice(&uid);
    out
}

fn implicit_element(out: &mut Vec<u8>, group: u16, element: u16, value: &[u8]) {
    out.extend_from_slice(&group.to_le_bytes());
    out.extend_from_slice(&element.to_le_bytes());
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value);
}

fn explicit_element(out: &mut Vec<u8>, group: u16, element: u16, vr: &[u8; 2], value: &[u8]) {
    out.extend_from_slice(&group.to_le_bytes());
    out.extend_from_slice(&element.to_le_bytes());
    out.extend_from_slice(vr);
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
}

#[test]
fn implicit_vr_attributes_are_recovered_from_the_dictionary() {
    let mut data = file_with_meta("1.2.840.10008.1.2");
    implicit_element(&mut data, 0x0028, 0x0010, &512u16.to_le_bytes());
    implicit_element(&mut data, 0x0028, 0x0011, &256u16.to_le_bytes());
    implicit_element(&mut data, 0x0008, 0x0060, b"MR");
    implicit_element(&mut data, 0x0009, 0x0001, b"ABCD");

    let decoder = FileDecoder::from_bytes(data).unwrap();
    let info = decoder.image_info();
    assert_eq!(info.height, 512);
    assert_eq!(info.width, 256);
    assert_eq!(info.modality.as_deref(), Some("MR"));
    assert_eq!(decoder.int(tags::ROWS), Some(512));
    // unnamed private tags keep their value under a placeholder name
    assert_eq!(decoder.info(Tag(0x0009, 0x0001)), Some("Private Tag: ABCD"));
}

#[test]
fn sequence_entries_are_prefixed_and_scoped() {
    let mut data = file_with_meta("1.2.840.10008.1.2.1");
    // (0008,1140) SQ with a defined length holding one item with one
    // UI element
    let mut item_content = Vec::new();
    explicit_element(&mut item_content, 0x0008, 0x0018, b"UI", b"1.29");
    let mut sq_content = Vec::new();
    sq_content.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
    sq_content.extend_from_slice(&(item_content.len() as u32).to_le_bytes());
    sq_content.extend_from_slice(&item_content);

    data.extend_from_slice(&[0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0, 0]);
    data.extend_from_slice(&(sq_content.len() as u32).to_le_bytes());
    data.extend_from_slice(&sq_content);
    // a top-level element after the sequence
    explicit_element(&mut data, 0x0008, 0x0060, b"CS", b"CT");

    let decoder = FileDecoder::from_bytes(data).unwrap();
    assert_eq!(
        decoder.info(Tag(0x0008, 0x0018)),
        Some(">SOPInstanceUID: 1.29")
    );
    // the sequence ends without a delimiter; the next element is back at
    // the top level
    assert_eq!(decoder.info(tags::MODALITY), Some("Modality: CT"));
    assert_eq!(decoder.image_info().modality.as_deref(), Some("CT"));
}

#[test]
fn undefined_length_sequence_is_delimited() {
    let mut data = file_with_meta("1.2.840.10008.1.2.1");
    data.extend_from_slice(&[0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0, 0]);
    data.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    // item with undefined length
    data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
    data.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    explicit_element(&mut data, 0x0008, 0x0018, b"UI", b"1.29");
    // item delimiter, then sequence delimiter
    data.extend_from_slice(&[0xFE, 0xFF, 0x0D, 0xE0, 0, 0, 0, 0]);
    data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0, 0, 0, 0]);
    explicit_element(&mut data, 0x0008, 0x0060, b"CS", b"CT");

    let decoder = FileDecoder::from_bytes(data).unwrap();
    assert_eq!(
        decoder.info(Tag(0x0008, 0x0018)),
        Some(">SOPInstanceUID: 1.29")
    );
    assert_eq!(decoder.info(tags::MODALITY), Some("Modality: CT"));
}

#[test]
fn icon_image_sequence_does_not_clobber_the_main_image() {
    let mut data = file_with_meta("1.2.840.10008.1.2.1");
    explicit_element(&mut data, 0x0028, 0x0010, b"US", &512u16.to_le_bytes());
    explicit_element(&mut data, 0x0028, 0x0011, b"US", &512u16.to_le_bytes());
    // icon sequence with its own tiny Rows element, skipped wholesale
    let mut icon_content = Vec::new();
    icon_content.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
    icon_content.extend_from_slice(&10u32.to_le_bytes());
    explicit_element(&mut icon_content, 0x0028, 0x0010, b"US", &64u16.to_le_bytes());
    data.extend_from_slice(&[0x88, 0x00, 0x00, 0x02, b'S', b'Q', 0, 0]);
    data.extend_from_slice(&(icon_content.len() as u32).to_le_bytes());
    data.extend_from_slice(&icon_content);
    explicit_element(&mut data, 0x0008, 0x0060, b"CS", b"CT");

    let decoder = FileDecoder::from_bytes(data).unwrap();
    assert_eq!(decoder.image_info().height, 512);
    assert_eq!(decoder.image_info().width, 512);
    assert_eq!(decoder.image_info().modality.as_deref(), Some("CT"));
}
