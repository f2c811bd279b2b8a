use armcore::cpu::arm::classification::InstructionClass;
use armcore::cpu::psr::CpuState;
use armcore::cpu::registers::REG_LR;
use armcore::{Arm7tdmi, BusFault, CpuConfig, CpuError, FlatMemory, Mode};
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

const NOP: u32 = 0xE1A0_0000; // MOV R0, R0
const HALT: u32 = 0xEAFF_FFFE; // B .

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `words` placed at their byte addresses, NOPs everywhere else.
fn program(size: usize, words: &[(u32, u32)]) -> FlatMemory {
    let mut memory = vec![NOP; size / 4];
    for &(address, word) in words {
        memory[address as usize / 4] = word;
    }
    FlatMemory::from_words(0, &memory)
}

#[test]
fn counting_loop() {
    init_tracing();

    let bus = program(
        0x18,
        &[
            (0x00, 0xE3A0_0005), // MOV R0, #5
            (0x04, 0xE3A0_1000), // MOV R1, #0
            (0x08, 0xE081_1000), // loop: ADD R1, R1, R0
            (0x0C, 0xE250_0001), // SUBS R0, R0, #1
            (0x10, 0x1AFF_FFFC), // BNE loop
            (0x14, HALT),
        ],
    );
    let mut cpu = Arm7tdmi::new(bus);

    cpu.run_until(|cpu| cpu.next_fetch_address() == 0x14).unwrap();

    assert_eq!(cpu.registers.register_at(0), 0);
    assert_eq!(cpu.registers.register_at(1), 15);
    assert!(cpu.cpsr.zero_flag());
    assert!(cpu.cpsr.carry_flag());
}

#[test]
fn software_interrupt_round_trip() {
    init_tracing();

    let bus = program(
        0x110,
        &[
            (0x08, 0xE3A0_2042),  // SWI vector: MOV R2, #0x42
            (0x0C, 0xE1B0_F00E),  // MOVS PC, LR
            (0x100, 0xE3A0_0001), // MOV R0, #1
            (0x104, 0xEF00_0012), // SWI 0x12
            (0x108, 0xE3A0_3003), // MOV R3, #3
            (0x10C, HALT),
        ],
    );
    let config = CpuConfig {
        initial_mode: Mode::User,
        reset_vector: 0x100,
        ..CpuConfig::default()
    };
    let mut cpu = Arm7tdmi::with_config(bus, config);
    let user_cpsr = cpu.cpsr;

    cpu.run_until(|cpu| cpu.cpsr.mode() == Mode::Supervisor).unwrap();
    assert_eq!(cpu.next_fetch_address(), 0x08);
    assert_eq!(cpu.registers.register_at(REG_LR), 0x108);
    assert_eq!(cpu.spsr(), Ok(user_cpsr));

    cpu.run_until(|cpu| cpu.next_fetch_address() == 0x10C).unwrap();
    assert_eq!(cpu.cpsr, user_cpsr);
    assert_eq!(cpu.registers.register_at(0), 1);
    assert_eq!(cpu.registers.register_at(2), 0x42);
    assert_eq!(cpu.registers.register_at(3), 3);
    assert_eq!(cpu.register_bank.svc.lr, 0x108);
}

#[test]
fn undefined_instruction_is_trapped() {
    init_tracing();

    let bus = program(
        0x0C,
        &[
            (0x00, 0xE7F0_00F0), // permanently undefined
            (0x04, 0xE3A0_5007), // Undefined vector: MOV R5, #7
            (0x08, HALT),
        ],
    );
    let mut cpu = Arm7tdmi::new(bus);

    cpu.run_until(|cpu| cpu.next_fetch_address() == 0x08).unwrap();

    assert_eq!(cpu.cpsr.mode(), Mode::Undefined);
    assert_eq!(cpu.registers.register_at(5), 7);
    assert_eq!(cpu.registers.register_at(REG_LR), 0x04);
    assert_eq!(cpu.spsr().map(|spsr| spsr.mode()), Ok(Mode::Supervisor));
}

#[test]
fn fetch_fault_leaves_state_untouched() {
    init_tracing();

    let mut cpu = Arm7tdmi::new(FlatMemory::from_words(0, &[NOP]));
    cpu.step().unwrap();
    let before = cpu.snapshot();

    assert_eq!(
        cpu.step(),
        Err(CpuError::FetchFault {
            address: 4,
            fault: BusFault::Unmapped(4),
        })
    );
    assert_eq!(cpu.snapshot(), before);
}

#[test]
fn memory_classes_are_unsupported() {
    init_tracing();

    // LDR R0, [R1, #4]
    let mut cpu = Arm7tdmi::new(FlatMemory::from_words(0, &[0xE591_0004]));

    assert_eq!(
        cpu.run_until(|_| false),
        Err(CpuError::Unsupported {
            opcode: 0xE591_0004,
            class: InstructionClass::SingleDataTransfer,
        })
    );
    assert_eq!(cpu.next_fetch_address(), 0);
}

#[test]
fn branch_exchange_into_thumb_stops() {
    init_tracing();

    let bus = program(
        0x08,
        &[
            (0x00, 0xE3A0_0011), // MOV R0, #0x11
            (0x04, 0xE12F_FF10), // BX R0
        ],
    );
    let mut cpu = Arm7tdmi::new(bus);

    assert_eq!(
        cpu.run_until(|_| false),
        Err(CpuError::ThumbState { address: 0x10 })
    );
    assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
}

#[test]
fn stop_predicate_runs_before_every_step() {
    init_tracing();

    let mut cpu = Arm7tdmi::new(program(0x10, &[]));
    let mut steps = 0;

    cpu.run_until(|_| {
        steps += 1;
        steps > 3
    })
    .unwrap();

    assert_eq!(cpu.next_fetch_address(), 0x0C);
}
