//! Struct cursor behavior against recorded memory traffic

mod common;

use common::RecordingMemory;
use luaprobe_core::cursor::StructCursor;
use luaprobe_core::memory::{MemoryAccessorExt, PointerWidth, SnapshotMemory, StructField};
use luaprobe_core::types::Address;

const BASE: u64 = 0x4000;

fn memory(width: PointerWidth) -> RecordingMemory<SnapshotMemory>
{
    RecordingMemory::new(SnapshotMemory::new(width).with_region(BASE, vec![0xa5; 64]))
}

fn read_then_skip_agree<T: StructField>(width: PointerWidth, start: u64)
{
    let memory = memory(width);

    let mut reader = StructCursor::new(&memory, Address::from(start));
    let mut skipper = StructCursor::new(&memory, Address::from(start));
    reader.read::<T>();
    skipper.skip::<T>();
    assert_eq!(reader.address(), skipper.address(), "start {start:#x}, size {}", T::SIZE);
}

#[test]
fn test_read_and_skip_advance_identically()
{
    for width in [PointerWidth::Four, PointerWidth::Eight] {
        // Inside the region, partially outside it, and entirely unmapped.
        for start in [BASE, BASE + 1, BASE + 3, BASE + 61, 0x9000_0001] {
            read_then_skip_agree::<u8>(width, start);
            read_then_skip_agree::<u16>(width, start);
            read_then_skip_agree::<i32>(width, start);
            read_then_skip_agree::<u32>(width, start);
            read_then_skip_agree::<i64>(width, start);
            read_then_skip_agree::<f64>(width, start);
        }
    }
}

#[test]
fn test_pointer_read_and_skip_advance_identically()
{
    for width in [PointerWidth::Four, PointerWidth::Eight] {
        for start in [BASE + 1, BASE + 60, 0x9000_0002] {
            let memory = memory(width);
            let mut reader = StructCursor::new(&memory, Address::from(start));
            let mut skipper = StructCursor::new(&memory, Address::from(start));
            reader.read_pointer();
            skipper.skip_pointer();
            assert_eq!(reader.address(), skipper.address());
        }
    }
}

#[test]
fn test_failed_read_does_not_shift_later_fields()
{
    // struct { int a; int b; } where only `b` is mapped.
    let memory = SnapshotMemory::new(PointerWidth::Eight).with_region(0x1004, 7i32.to_le_bytes().to_vec());
    let mut cursor = StructCursor::new(&memory, Address::from(0x1000));
    assert_eq!(cursor.read::<i32>(), None);
    assert_eq!(cursor.read::<i32>(), Some(7));
    assert_eq!(cursor.address(), Address::from(0x1008));
}

#[test]
fn test_each_field_is_one_read_of_its_size()
{
    let memory = memory(PointerWidth::Eight);
    let mut cursor = StructCursor::new(&memory, Address::from(BASE));
    cursor.read::<u8>();
    cursor.read::<u32>();
    cursor.skip::<u8>();
    cursor.read::<f64>();

    assert_eq!(
        memory.reads(),
        vec![
            (Address::from(BASE), 1),
            (Address::from(BASE + 4), 4),
            (Address::from(BASE + 16), 8),
        ]
    );
}

#[test]
fn test_pointer_reads_match_target_width()
{
    for (width, size) in [(PointerWidth::Four, 4), (PointerWidth::Eight, 8)] {
        let memory = memory(width);
        let mut cursor = StructCursor::new(&memory, Address::from(BASE + 1));
        cursor.read_pointer();
        cursor.read_size();
        memory.read_pointer(Address::from(BASE));

        let reads = memory.reads();
        assert_eq!(reads.len(), 3);
        assert!(reads.iter().all(|&(_, len)| len == size), "{width:?}: {reads:?}");
        assert_eq!(reads[0].0, Address::from(BASE + size as u64));
    }
}

#[test]
fn test_pointer_writes_match_target_width()
{
    for (width, size) in [(PointerWidth::Four, 4), (PointerWidth::Eight, 8)] {
        let mut memory = memory(width);
        memory.write_pointer(Address::from(BASE + 8), Address::from(0x1234)).unwrap();
        assert_eq!(memory.writes, vec![(Address::from(BASE + 8), size)]);
        assert_eq!(memory.read_pointer(Address::from(BASE + 8)), Some(Address::from(0x1234)));
    }
}

#[test]
fn test_pointer_width_is_captured_at_creation()
{
    let memory = SnapshotMemory::new(PointerWidth::Four);
    let cursor = StructCursor::new(&memory, Address::NULL);
    assert_eq!(cursor.pointer_width(), PointerWidth::Four);
}
