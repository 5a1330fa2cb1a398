//! Producer and consumer on separate threads.

use std::{hint, thread};

use rac_core::utils::connection::CommandQueue;

const ITEMS: u32 = 200_000;

#[test]
fn test_fifo_order_across_threads() {
    let mut queue: CommandQueue<u32, 8> = CommandQueue::new();
    let (mut tx, mut rx) = queue.split();

    thread::scope(|s| {
        s.spawn(move || {
            for i in 0..ITEMS {
                let mut item = i;
                while let Err(back) = tx.try_push(item) {
                    item = back;
                    hint::spin_loop();
                }
            }
        });

        s.spawn(move || {
            let mut expected = 0;
            while expected < ITEMS {
                match rx.pop() {
                    Some(item) => {
                        assert_eq!(item, expected);
                        expected += 1;
                    }
                    None => hint::spin_loop(),
                }
            }
            assert!(rx.pop().is_none());
        });
    });

    assert!(queue.is_empty());
}

#[test]
fn test_records_cross_threads_intact() {
    let mut queue: CommandQueue<[u8; 8], 4> = CommandQueue::new();
    let (mut tx, mut rx) = queue.split();

    thread::scope(|s| {
        s.spawn(move || {
            for i in 0..10_000u32 {
                let b = i.to_be_bytes();
                let record = [b[0], b[1], b[2], b[3], b[3], b[2], b[1], b[0]];
                while tx.try_push(record).is_err() {
                    hint::spin_loop();
                }
            }
        });

        s.spawn(move || {
            let mut next = 0u32;
            while next < 10_000 {
                let Some(record) = rx.pop() else {
                    hint::spin_loop();
                    continue;
                };
                let b = next.to_be_bytes();
                assert_eq!(record, [b[0], b[1], b[2], b[3], b[3], b[2], b[1], b[0]]);
                next += 1;
            }
        });
    });
}
