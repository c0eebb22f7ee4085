use vm::layout::INITIAL_FREE_LOW;
use vm::{Fault, IoConsole, Machine, MachineConfig, PageTable, VmError, WordImage};

const HALT: u16 = 0xF025;
const OUT: u16 = 0xF021;
const PUTS: u16 = 0xF022;
const OUTU16: u16 = 0xF027;
const INU16: u16 = 0xF026;
const YIELD: u16 = 0xF028;
const BRK: u16 = 0xF029;

fn console(input: &'static [u8]) -> IoConsole<&'static [u8], Vec<u8>> {
    IoConsole::new(input, Vec::new())
}

fn boot(programs: Vec<(Vec<u16>, Vec<u16>)>) -> Machine {
    let mut machine = Machine::new();
    for (code, heap) in programs {
        machine
            .create_process(&mut WordImage::from(code), &mut WordImage::from(heap))
            .unwrap();
    }
    machine.load_process(0).unwrap();
    machine
}

#[test]
fn single_halt_restores_every_frame() {
    let mut machine = boot(vec![(vec![HALT], vec![])]);
    assert_eq!(
        machine.memory().free_bitmaps(),
        [INITIAL_FREE_LOW & !0b0001_1110_0000_0000, 0xFFFF]
    );

    let mut console = console(b"");
    machine.run(&mut console).unwrap();

    assert!(!machine.is_running());
    assert_eq!(machine.memory().free_bitmaps(), [INITIAL_FREE_LOW, 0xFFFF]);
    assert!(machine.pcb(0).is_terminated());
    assert_eq!(machine.current_pid(), None);
}

#[test]
fn heap_break_page_is_usable() {
    let code = [
        0x2006, // 0x3000 LD R0, 0x3007
        BRK,    // 0x3001
        0x2205, // 0x3002 LD R1, 0x3008
        0x2405, // 0x3003 LD R2, 0x3009
        0x7440, // 0x3004 STR R2, R1, #0
        0x6640, // 0x3005 LDR R3, R1, #0
        HALT,   // 0x3006
        0x5007, // page 10, grow, read + write
        0x5010,
        0xBEEF,
    ];
    let mut machine = boot(vec![(code.to_vec(), vec![])]);

    let mut console = console(b"");
    machine.run(&mut console).unwrap();

    assert_eq!(machine.registers().get(3), 0xBEEF);
    assert_eq!(machine.memory().free_bitmaps(), [INITIAL_FREE_LOW, 0xFFFF]);
}

#[test]
fn heap_image_is_readable_and_writable() {
    let code = [
        0x2204, // 0x3000 LD R1, 0x3005
        0x6040, // 0x3001 LDR R0, R1, #0
        0x1021, // 0x3002 ADD R0, R0, #1
        0x7040, // 0x3003 STR R0, R1, #0
        OUTU16, // 0x3004
        0x4000,
    ];
    let mut machine = boot(vec![(code.to_vec(), vec![41])]);
    let mut console = console(b"");

    for _ in 0..5 {
        machine.step(&mut console).unwrap();
    }

    assert_eq!(machine.read(0x4000), Ok(42));
    assert_eq!(console.into_output(), b"42\n");
}

#[test]
fn yielding_processes_interleave() {
    let program = [
        0x2005, // 0x3000 LD R0, 0x3006
        OUT,    // 0x3001
        YIELD,  // 0x3002
        0x2002, // 0x3003 LD R0, 0x3006
        OUT,    // 0x3004
        HALT,   // 0x3005
    ];
    let mut a = program.to_vec();
    a.push(b'A' as u16);
    let mut b = program.to_vec();
    b.push(b'B' as u16);
    let mut c = program.to_vec();
    c.push(b'C' as u16);

    let mut machine = boot(vec![(a, vec![]), (b, vec![]), (c, vec![])]);
    let mut console = console(b"");
    machine.run(&mut console).unwrap();

    assert_eq!(console.into_output(), b"ABCABC");
    assert_eq!(machine.memory().free_bitmaps(), [INITIAL_FREE_LOW, 0xFFFF]);
}

#[test]
fn strings_are_read_through_the_page_table() {
    let code = [
        0xE002, // 0x3000 LEA R0, 0x3003
        PUTS,   // 0x3001
        HALT,   // 0x3002
        b'o' as u16,
        b'k' as u16,
        0,
    ];
    let mut machine = boot(vec![(code.to_vec(), vec![])]);
    let mut console = console(b"");

    machine.run(&mut console).unwrap();

    assert_eq!(console.into_output(), b"ok");
}

#[test]
fn console_input_reaches_registers() {
    let code = [INU16, OUTU16, HALT];
    let mut machine = boot(vec![(code.to_vec(), vec![])]);
    let mut console = console(b" 1234\n");

    machine.run(&mut console).unwrap();

    assert_eq!(machine.registers().get(0), 1234);
    assert_eq!(console.into_output(), b"1234\n");
}

#[test]
fn one_faulting_process_stops_everyone() {
    let faulty = [
        0x6040, // LDR R0, R1, #0 with R1 = 0
    ];
    let mut machine = boot(vec![(vec![YIELD, HALT], vec![]), (faulty.to_vec(), vec![])]);
    let mut console = console(b"");

    let result = machine.run(&mut console);

    assert!(matches!(result, Err(VmError::Fault(Fault::ReservedPage { address: 0 }))));
    assert_eq!(machine.current_pid(), Some(1));
    assert!(!machine.pcb(0).is_terminated());
    assert_eq!(PageTable::for_process(0).valid_pages(machine.memory()).count(), 4);
}

#[test]
fn custom_segment_sizes() {
    let config = MachineConfig {
        code_pages: 1,
        heap_pages: 3,
        ..MachineConfig::default()
    };
    let mut machine = Machine::with_config(config).unwrap();
    machine
        .create_process(&mut WordImage::from(vec![HALT]), &mut WordImage::default())
        .unwrap();
    machine.load_process(0).unwrap();

    assert_eq!(machine.read(0x3800), Ok(0));
    assert!(machine.write(0x3800, 1).is_ok());
    assert!(machine.write(0x4800, 1).is_ok());
    assert!(machine.read(0x5000).is_err());
}
