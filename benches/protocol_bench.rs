use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tn3270r::lib3270::server_screen::TNServerScreen;
use tn3270r::lib3270::{AidKey, Display3270, ProtocolProcessor3270, ScreenSize};
use tn3270r::telnet_negotiation::{NegotiatorConfig, TelnetNegotiator};

fn login_screen() -> TNServerScreen {
    let mut screen = TNServerScreen::new(ScreenSize::Model2);
    screen.format(&[
        "}                         TN3270R SAMPLE HOST",
        "",
        "]Userid  ===>[        ]",
        "]Password===>~        ]",
        "",
        "]PF3=Exit",
    ]);
    screen.set_cursor(14, 2);
    screen
}

/// Strip the IAC EOR trailer and undo IAC doubling.
fn record(buffer: &[u8]) -> Vec<u8> {
    tn3270r::protocol_common::unescape_iac(&buffer[..buffer.len() - 2])
}

fn bench_erase_write(c: &mut Criterion) {
    let data = record(&login_screen().as_tn3270_buffer(true, true, false));

    c.bench_function("process_erase_write", |b| {
        b.iter(|| {
            let mut display = Display3270::with_size(ScreenSize::Model2);
            let mut processor = ProtocolProcessor3270::new();
            black_box(processor.process_data(black_box(&data), &mut display)).unwrap();
        })
    });
}

fn bench_read_modified(c: &mut Criterion) {
    let data = record(&login_screen().as_tn3270_buffer(true, true, false));
    let mut display = Display3270::with_size(ScreenSize::Model2);
    let mut processor = ProtocolProcessor3270::new();
    processor.process_data(&data, &mut display).unwrap();
    display.set_mdt(display.address_of(14, 2));

    c.bench_function("create_read_modified_response", |b| {
        b.iter(|| {
            black_box(processor.create_read_modified_response(
                black_box(&display),
                AidKey::Enter,
                false,
            ))
        })
    });
}

fn bench_server_buffer(c: &mut Criterion) {
    let screen = login_screen();

    c.bench_function("as_tn3270_buffer", |b| {
        b.iter(|| black_box(screen.as_tn3270_buffer(true, true, true)))
    });
}

fn bench_telnet_records(c: &mut Criterion) {
    let mut wire = Vec::new();
    for _ in 0..16 {
        wire.extend(login_screen().as_tn3270_buffer(true, true, false));
    }

    c.bench_function("negotiator_record_split", |b| {
        b.iter(|| {
            let mut negotiator = TelnetNegotiator::new(NegotiatorConfig::default());
            negotiator.set_state(tn3270r::ConnectionState::Connected3270);
            black_box(negotiator.process_incoming_data(black_box(&wire)))
        })
    });
}

criterion_group!(
    benches,
    bench_erase_write,
    bench_read_modified,
    bench_server_buffer,
    bench_telnet_records
);
criterion_main!(benches);
