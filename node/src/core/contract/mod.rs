//! A deterministic, gas-metered stack machine. Source is a
//! whitespace-separated token stream, e.g. `"PUSH 1 PUSH 2 ADD SSTORE x HALT"`.

use ember_common::error::ContractError;
use log::trace;
use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Gas charged per executed instruction, win or lose. Flat and uniform:
/// the toy language has no operation expensive enough to warrant its own
/// price.
const GAS_PER_STEP: u64 = 100;

#[derive(Debug, Clone)]
pub struct ContractExecutionResult {
    pub gas_used: u64,
    pub success: bool,
    pub storage: BTreeMap<String, String>,
}

/// Inputs to a single contract invocation.
pub struct ExecutionContext<'a> {
    pub caller: &'a ember_common::crypto::Hash,
    pub value: &'a ember_common::Amount,
    pub storage: &'a BTreeMap<String, String>,
    pub gas_limit: u64,
    /// Mirrors the node's `ENABLE_LOGGING` flag: when set, every step
    /// is emitted as a `trace!` event instead of running silently.
    pub log_enabled: bool,
}

enum Token {
    Push(BigUint),
    Pop,
    Add,
    Sub,
    Mul,
    Eq,
    Lt,
    Gt,
    /// `JUMPIZ <index>`: jump to the given token index if the top of the
    /// stack is zero, consuming it.
    JumpIfZero(usize),
    Jump(usize),
    Sload(String),
    Sstore(String),
    Caller,
    Value,
    Halt,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ContractError> {
    let words: Vec<&str> = source.split_whitespace().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let word = words[i];
        let token = match word {
            "PUSH" => {
                let arg = words
                    .get(i + 1)
                    .ok_or_else(|| ContractError::UndefinedOpcode("PUSH with no argument".into()))?;
                let value = BigUint::from_str(arg)
                    .map_err(|_| ContractError::UndefinedOpcode(format!("PUSH {arg}")))?;
                i += 1;
                Token::Push(value)
            }
            "POP" => Token::Pop,
            "ADD" => Token::Add,
            "SUB" => Token::Sub,
            "MUL" => Token::Mul,
            "EQ" => Token::Eq,
            "LT" => Token::Lt,
            "GT" => Token::Gt,
            "JUMPIZ" => {
                let arg = words
                    .get(i + 1)
                    .ok_or_else(|| ContractError::UndefinedOpcode("JUMPIZ with no argument".into()))?;
                let index = arg
                    .parse()
                    .map_err(|_| ContractError::UndefinedOpcode(format!("JUMPIZ {arg}")))?;
                i += 1;
                Token::JumpIfZero(index)
            }
            "JUMP" => {
                let arg = words
                    .get(i + 1)
                    .ok_or_else(|| ContractError::UndefinedOpcode("JUMP with no argument".into()))?;
                let index = arg
                    .parse()
                    .map_err(|_| ContractError::UndefinedOpcode(format!("JUMP {arg}")))?;
                i += 1;
                Token::Jump(index)
            }
            "SLOAD" => {
                let key = words
                    .get(i + 1)
                    .ok_or_else(|| ContractError::UndefinedOpcode("SLOAD with no key".into()))?;
                i += 1;
                Token::Sload(key.to_string())
            }
            "SSTORE" => {
                let key = words
                    .get(i + 1)
                    .ok_or_else(|| ContractError::UndefinedOpcode("SSTORE with no key".into()))?;
                i += 1;
                Token::Sstore(key.to_string())
            }
            "CALLER" => Token::Caller,
            "VALUE" => Token::Value,
            "HALT" => Token::Halt,
            other => return Err(ContractError::UndefinedOpcode(other.to_string())),
        };
        tokens.push(token);
        i += 1;
    }
    Ok(tokens)
}

/// Run `source` against `ctx`, returning the resulting storage mapping.
/// Never panics: every failure mode (gas exhaustion, stack underflow,
/// undefined opcode) surfaces as `success: false` with the
/// pre-execution storage left untouched.
pub fn execute(source: &str, ctx: &ExecutionContext) -> ContractExecutionResult {
    let mut storage = ctx.storage.clone();
    let result = run(source, ctx, &mut storage);
    match result {
        Ok(gas_used) => ContractExecutionResult {
            gas_used,
            success: true,
            storage,
        },
        Err((gas_used, _)) => ContractExecutionResult {
            gas_used,
            success: false,
            storage: ctx.storage.clone(),
        },
    }
}

fn run(
    source: &str,
    ctx: &ExecutionContext,
    storage: &mut BTreeMap<String, String>,
) -> Result<u64, (u64, ContractError)> {
    let tokens = tokenize(source).map_err(|e| (0, e))?;
    let mut stack: Vec<BigUint> = Vec::new();
    let mut gas_used: u64 = 0;
    let mut pc = 0usize;
    let mut halted = false;

    while pc < tokens.len() {
        gas_used += GAS_PER_STEP;
        if gas_used > ctx.gas_limit {
            return Err((ctx.gas_limit, ContractError::OutOfGas));
        }

        if ctx.log_enabled {
            trace!("pc={pc} gas_used={gas_used} stack_depth={}", stack.len());
        }

        match &tokens[pc] {
            Token::Push(v) => stack.push(v.clone()),
            Token::Pop => {
                pop(&mut stack).map_err(|e| (gas_used, e))?;
            }
            Token::Add => {
                let (a, b) = pop2(&mut stack).map_err(|e| (gas_used, e))?;
                stack.push(a + b);
            }
            Token::Sub => {
                let (a, b) = pop2(&mut stack).map_err(|e| (gas_used, e))?;
                stack.push(if a >= b { a - b } else { BigUint::zero() });
            }
            Token::Mul => {
                let (a, b) = pop2(&mut stack).map_err(|e| (gas_used, e))?;
                stack.push(a * b);
            }
            Token::Eq => {
                let (a, b) = pop2(&mut stack).map_err(|e| (gas_used, e))?;
                stack.push(bool_value(a == b));
            }
            Token::Lt => {
                let (a, b) = pop2(&mut stack).map_err(|e| (gas_used, e))?;
                stack.push(bool_value(a < b));
            }
            Token::Gt => {
                let (a, b) = pop2(&mut stack).map_err(|e| (gas_used, e))?;
                stack.push(bool_value(a > b));
            }
            Token::JumpIfZero(target) => {
                let top = pop(&mut stack).map_err(|e| (gas_used, e))?;
                if top.is_zero() {
                    pc = *target;
                    continue;
                }
            }
            Token::Jump(target) => {
                pc = *target;
                continue;
            }
            Token::Sload(key) => {
                let value = storage
                    .get(key)
                    .map(|s| BigUint::from_str(s).unwrap_or_else(|_| BigUint::zero()))
                    .unwrap_or_else(BigUint::zero);
                stack.push(value);
            }
            Token::Sstore(key) => {
                let value = pop(&mut stack).map_err(|e| (gas_used, e))?;
                storage.insert(key.clone(), value.to_string());
            }
            Token::Caller => stack.push(hash_to_biguint(ctx.caller)),
            Token::Value => stack.push(ctx.value.as_biguint().clone()),
            Token::Halt => {
                halted = true;
                break;
            }
        }
        pc += 1;
    }

    if !halted {
        return Err((gas_used, ContractError::NoHalt));
    }
    Ok(gas_used)
}

fn pop(stack: &mut Vec<BigUint>) -> Result<BigUint, ContractError> {
    stack.pop().ok_or(ContractError::StackUnderflow)
}

fn pop2(stack: &mut Vec<BigUint>) -> Result<(BigUint, BigUint), ContractError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    Ok((a, b))
}

fn bool_value(b: bool) -> BigUint {
    BigUint::from(if b { 1u8 } else { 0u8 })
}

fn hash_to_biguint(hash: &ember_common::crypto::Hash) -> BigUint {
    BigUint::from_bytes_be(hash.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::crypto::KeyPair;
    use ember_common::Amount;

    fn ctx<'a>(
        caller: &'a ember_common::crypto::Hash,
        value: &'a Amount,
        storage: &'a BTreeMap<String, String>,
    ) -> ExecutionContext<'a> {
        ExecutionContext {
            caller,
            value,
            storage,
            gas_limit: 1_000_000,
            log_enabled: false,
        }
    }

    #[test]
    fn deploy_then_call_stores_sum() {
        let caller = KeyPair::generate().address();
        let value = Amount::zero();
        let storage = BTreeMap::new();
        let result = execute("PUSH 1 PUSH 2 ADD SSTORE x HALT", &ctx(&caller, &value, &storage));
        assert!(result.success);
        assert_eq!(result.storage.get("x"), Some(&"3".to_string()));
    }

    #[test]
    fn missing_halt_fails() {
        let caller = KeyPair::generate().address();
        let value = Amount::zero();
        let storage = BTreeMap::new();
        let result = execute("PUSH 1 POP", &ctx(&caller, &value, &storage));
        assert!(!result.success);
    }

    #[test]
    fn stack_underflow_fails_without_corrupting_storage() {
        let caller = KeyPair::generate().address();
        let value = Amount::zero();
        let mut storage = BTreeMap::new();
        storage.insert("x".to_string(), "9".to_string());
        let result = execute("ADD HALT", &ctx(&caller, &value, &storage));
        assert!(!result.success);
        assert_eq!(result.storage.get("x"), Some(&"9".to_string()));
    }

    #[test]
    fn out_of_gas_when_limit_too_low() {
        let caller = KeyPair::generate().address();
        let value = Amount::zero();
        let storage = BTreeMap::new();
        let tiny = ExecutionContext {
            caller: &caller,
            value: &value,
            storage: &storage,
            gas_limit: 50,
            log_enabled: false,
        };
        let result = execute("PUSH 1 PUSH 2 ADD HALT", &tiny);
        assert!(!result.success);
    }

    #[test]
    fn log_enabled_does_not_change_the_result() {
        let caller = KeyPair::generate().address();
        let value = Amount::zero();
        let storage = BTreeMap::new();
        let quiet = ctx(&caller, &value, &storage);
        let loud = ExecutionContext {
            log_enabled: true,
            ..ctx(&caller, &value, &storage)
        };
        let a = execute("PUSH 1 PUSH 2 ADD SSTORE x HALT", &quiet);
        let b = execute("PUSH 1 PUSH 2 ADD SSTORE x HALT", &loud);
        assert_eq!(a.storage, b.storage);
        assert_eq!(a.success, b.success);
    }

    #[test]
    fn sload_reads_existing_value() {
        let caller = KeyPair::generate().address();
        let value = Amount::zero();
        let mut storage = BTreeMap::new();
        storage.insert("x".to_string(), "41".to_string());
        let result = execute("SLOAD x PUSH 1 ADD SSTORE x HALT", &ctx(&caller, &value, &storage));
        assert!(result.success);
        assert_eq!(result.storage.get("x"), Some(&"42".to_string()));
    }
}
