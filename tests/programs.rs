//! End-to-end scenarios: compile source with the public entry point, run it
//! on the simulator, and check the observable machine state.

use vonsim::compile;
use vonsim::sim::device::DeviceConfig;
use vonsim::sim::event::{RunOutcome, StreamState};
use vonsim::sim::mem::{MemInit, MEM_TOP};
use vonsim::sim::Simulator;

fn load(src: &str, config: DeviceConfig) -> Simulator {
    let program = compile(src).unwrap_or_else(|errs| {
        panic!("compile failed: {}", errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))
    });
    let mut sim = Simulator::new(config);
    sim.load_program(&program, MemInit::Clean);
    sim
}

fn run(src: &str) -> Simulator {
    let mut sim = load(src, DeviceConfig::SwitchesLeds);
    let outcome = sim.start_cpu().run_to_completion();
    assert_eq!(outcome, Some(RunOutcome::Halted));
    sim
}

#[test]
fn hello_counter() {
    let sim = run("
        ORG 1000h
        X DB 0
        ORG 2000h
        MOV AL, X
        INC AL
        MOV X, AL
        HLT
        END
    ");
    assert_eq!(sim.mem.read_byte(0x1000), Ok(1));
}

#[test]
fn loop_and_stack() {
    let sim = run("
        ORG 2000h
        MOV AX, 1
        PUSH AX
        MOV AX, 2
        PUSH AX
        MOV AX, 3
        PUSH AX
        POP AX
        POP BX
        POP CX
        HLT
        END
    ");
    assert_eq!(sim.regs.ax, 3);
    assert_eq!(sim.regs.bx, 2);
    assert_eq!(sim.regs.cx, 1);
    assert_eq!(sim.regs.sp, MEM_TOP);
}

#[test]
fn carry_flag() {
    let sim = run("
        ORG 2000h
        MOV AL, 0FFh
        ADD AL, 1
        HLT
        END
    ");
    assert_eq!(sim.regs.ax & 0xFF, 0x00);
    assert!(sim.flags.zf);
    assert!(sim.flags.cf);
    assert!(!sim.flags.of);
    assert!(!sim.flags.sf);
}

#[test]
fn signed_overflow() {
    let sim = run("
        ORG 2000h
        MOV AL, 7Fh
        ADD AL, 1
        HLT
        END
    ");
    assert_eq!(sim.regs.ax & 0xFF, 0x80);
    assert!(!sim.flags.cf);
    assert!(sim.flags.of);
    assert!(sim.flags.sf);
    assert!(!sim.flags.zf);
}

#[test]
fn int6_reads_console() {
    let mut sim = load(
        "
        ORG 2000h
        MOV BX, 1000h
        INT 6
        HLT
        END
        ",
        DeviceConfig::SwitchesLeds,
    );

    let mut stream = sim.start_cpu();
    // the stream pauses on the console read request
    loop {
        match stream.resume() {
            StreamState::Event(_) => {}
            StreamState::AwaitingInput => break,
            StreamState::Complete(o) => panic!("halted before reading input: {o:?}"),
        }
    }
    stream.provide_input(b'A');
    assert_eq!(stream.run_to_completion(), Some(RunOutcome::Halted));
    assert_eq!(sim.mem.read_byte(0x1000), Ok(0x41));
}

#[test]
fn pic_dispatch_on_f10() {
    let mut sim = load(
        "
        ORG 40
        DW OFFSET RUTINA
        ORG 2000h
        MOV AL, 0FEh     ; unmask line 0
        OUT 11h, AL
        MOV AL, 10
        OUT 14h, AL      ; INT0 vector = 10, table entry at 40
        STI
        ESPERA: CMP BL, 1
        JNZ ESPERA
        HLT
        RUTINA: MOV BL, 1
        MOV AL, 20h
        OUT 10h, AL      ; EOI
        IRET
        END
        ",
        DeviceConfig::SwitchesLeds,
    );
    let remote = sim.remote();

    let mut stream = sim.start_cpu();
    for _ in 0..200 {
        assert!(matches!(stream.resume(), StreamState::Event(_)));
    }
    remote.press_f10();
    assert_eq!(stream.run_to_completion(), Some(RunOutcome::Halted));

    assert_eq!(sim.regs.bx & 0xFF, 1, "handler ran");
    assert_eq!(sim.regs.sp, MEM_TOP, "IRET unwound FLAGS and IP");
    assert_eq!(sim.bus.pic.isr, 0, "EOI retired the interrupt");
    assert!(sim.flags.if_, "IRET restored IF");
}

#[test]
fn timer_interrupt_after_three_ticks() {
    let mut sim = load(
        "
        ORG 24h
        DW OFFSET RUTINA
        ORG 2000h
        MOV AL, 3
        OUT 21h, AL      ; COMP = 3
        MOV AL, 0FDh     ; unmask line 1
        OUT 11h, AL
        MOV AL, 9
        OUT 15h, AL      ; INT1 vector = 9, table entry at 36
        STI
        ESPERA: CMP BL, 1
        JNZ ESPERA
        HLT
        RUTINA: MOV BL, 1
        MOV AL, 20h
        OUT 10h, AL
        IRET
        END
        ",
        DeviceConfig::SwitchesLeds,
    );
    let remote = sim.remote();

    let mut stream = sim.start_cpu();
    for _ in 0..200 {
        assert!(matches!(stream.resume(), StreamState::Event(_)));
    }
    remote.clock_tick();
    remote.clock_tick();
    remote.clock_tick();
    assert_eq!(stream.run_to_completion(), Some(RunOutcome::Halted));
    assert_eq!(sim.regs.bx & 0xFF, 1);
    assert_eq!(sim.bus.timer.cont, 3);
}

#[test]
fn switches_to_leds() {
    let mut sim = load(
        "
        ORG 2000h
        MOV AL, 0
        OUT 32h, AL      ; CA: port A all inputs
        MOV AL, 0FFh
        OUT 33h, AL      ; CB: port B all outputs
        IN AL, 30h       ; read the switches
        OUT 31h, AL      ; drive the LEDs
        HLT
        END
        ",
        DeviceConfig::SwitchesLeds,
    );
    sim.toggle_switch(0);
    sim.toggle_switch(2);

    assert_eq!(sim.start_cpu().run_to_completion(), Some(RunOutcome::Halted));
    let pio = sim.bus.pio.as_ref().unwrap();
    assert_eq!(pio.output_bits(vonsim::sim::device::pio::PioPort::B), 0b101);
}

#[test]
fn handshake_prints_to_paper() {
    let mut sim = load(
        "
        ORG 2000h
        MOV AL, 48h
        OUT 40h, AL      ; 'H' into the handshake data latch
        HLT
        END
        ",
        DeviceConfig::HandshakePrinter,
    );
    assert_eq!(sim.start_cpu().run_to_completion(), Some(RunOutcome::Halted));

    assert!(sim.bus.handshake.as_ref().unwrap().busy());
    sim.printer_print();
    assert_eq!(sim.console.screen(), "H");
    assert!(!sim.bus.handshake.as_ref().unwrap().busy());
}

#[test]
fn int7_prints_string() {
    let sim = run("
        ORG 1000h
        MSG DB \"Hola!\"
        LARGO EQU 5
        ORG 2000h
        MOV BX, OFFSET MSG
        MOV AL, LARGO
        INT 7
        HLT
        END
    ");
    assert_eq!(sim.console.screen(), "Hola!");
}

#[test]
fn org_boundaries() {
    assert!(compile("ORG 3FFEh\nDW 0\nEND").is_ok());

    let errs = compile("ORG 3FFFh\nDW 0\nEND").unwrap_err();
    assert_eq!(errs[0].code, "instruction-out-of-range");
}

#[test]
fn int_vector_boundaries() {
    assert!(compile("ORG 2000h\nINT 255\nHLT\nEND").is_ok());

    let errs = compile("ORG 2000h\nINT 256\nHLT\nEND").unwrap_err();
    assert_eq!(errs[0].code, "value-out-of-range");
}

#[test]
fn occupied_address_reported() {
    let errs = compile("ORG 1000h\nDW 1\nORG 1001h\nDB 2\nEND").unwrap_err();
    assert_eq!(errs[0].code, "occupied-address");
}

#[test]
fn registers_preserved_across_int_iret() {
    let sim = run("
        ORG 32
        DW OFFSET RUTINA
        ORG 2000h
        MOV AX, 1111h
        MOV BX, 2222h
        MOV CX, 3333h
        MOV DX, 4444h
        ADD AX, 0       ; settle flags
        INT 8           ; table entry at 32
        HLT
        RUTINA: PUSH AX
        MOV AX, 0FFFFh
        POP AX
        IRET
        END
    ");
    assert_eq!(sim.regs.ax, 0x1111);
    assert_eq!(sim.regs.bx, 0x2222);
    assert_eq!(sim.regs.cx, 0x3333);
    assert_eq!(sim.regs.dx, 0x4444);
    assert_eq!(sim.regs.sp, MEM_TOP);
    assert!(!sim.flags.cf && !sim.flags.zf && !sim.flags.sf && !sim.flags.of);
}
