//! The engine-facing circuit contract.
//!
//! Parsing and static analysis of arithmetic circuits belong to an external
//! library; the engine only consumes a read-only handle: a gate arena with
//! stable integer ids, per-symbol shape information, degree bounds, and a
//! modular evaluator. Test vectors ride along for end-to-end validation.

use crate::error::MifeError;

/// Stable id of a gate inside the arena.
pub type GateId = usize;

/// Binary arithmetic operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircOp {
    Add,
    Sub,
    Mul,
}

/// One node of the circuit DAG. `Op` children always refer to earlier ids,
/// so a plain forward scan is a topological traversal.
#[derive(Clone, Debug)]
pub enum Gate {
    /// Input bit, indexed across all symbols in declaration order.
    Input(usize),
    /// Constant (or secret) input.
    Const(usize),
    /// Binary operation over two earlier gates.
    Op { op: CircOp, lhs: GateId, rhs: GateId },
}

/// A known input/output pair used to validate the scheme end to end.
#[derive(Clone, Debug)]
pub struct TestVector {
    pub inputs: Vec<u64>,
    pub outputs: Vec<u64>,
}

/// Read-only circuit handle.
#[derive(Clone, Debug)]
pub struct Circuit {
    gates: Vec<Gate>,
    outputs: Vec<GateId>,
    symlens: Vec<usize>,
    sigmas: Vec<bool>,
    consts: Vec<u64>,
    binary: bool,
    tests: Vec<TestVector>,
    // degree analyses, computed once at construction
    var_degrees: Vec<u64>,
    const_degree: u64,
    delta: u64,
}

impl Circuit {
    /// Build a circuit handle, validating gate references and computing the
    /// degree analyses the scheme sizes itself by.
    pub fn new(
        gates: Vec<Gate>,
        outputs: Vec<GateId>,
        symlens: Vec<usize>,
        sigmas: Vec<bool>,
        consts: Vec<u64>,
        binary: bool,
        tests: Vec<TestVector>,
    ) -> Result<Self, MifeError> {
        if symlens.is_empty() || symlens.len() != sigmas.len() {
            return Err(MifeError::invalid("symbol shape mismatch"));
        }
        if outputs.is_empty() {
            return Err(MifeError::invalid("circuit has no outputs"));
        }
        let ninputs: usize = symlens.iter().sum();
        for (id, gate) in gates.iter().enumerate() {
            match *gate {
                Gate::Input(i) if i >= ninputs => {
                    return Err(MifeError::invalid(format!("gate {id}: input {i} out of range")));
                }
                Gate::Const(c) if c >= consts.len() => {
                    return Err(MifeError::invalid(format!("gate {id}: const {c} out of range")));
                }
                Gate::Op { lhs, rhs, .. } if lhs >= id || rhs >= id => {
                    return Err(MifeError::invalid(format!("gate {id}: forward reference")));
                }
                _ => {}
            }
        }
        if outputs.iter().any(|&o| o >= gates.len()) {
            return Err(MifeError::invalid("output gate out of range"));
        }

        let mut circ = Self {
            gates,
            outputs,
            symlens,
            sigmas,
            consts,
            binary,
            tests,
            var_degrees: Vec::new(),
            const_degree: 0,
            delta: 0,
        };
        circ.analyze();
        Ok(circ)
    }

    /// Per-gate degree propagation: leaves contribute degree one to their own
    /// component, ADD/SUB takes the componentwise max, MUL the sum.
    fn analyze(&mut self) {
        let nsym = self.symlens.len();
        // per gate: nsym symbol degrees plus one constants degree
        let mut degs: Vec<Vec<u64>> = Vec::with_capacity(self.gates.len());
        for gate in &self.gates {
            let mut d = vec![0u64; nsym + 1];
            match *gate {
                Gate::Input(i) => d[self.symbol_of(i).0] = 1,
                Gate::Const(_) => d[nsym] = 1,
                Gate::Op { op, lhs, rhs } => {
                    for k in 0..=nsym {
                        d[k] = match op {
                            CircOp::Add | CircOp::Sub => degs[lhs][k].max(degs[rhs][k]),
                            CircOp::Mul => degs[lhs][k] + degs[rhs][k],
                        };
                    }
                }
            }
            degs.push(d);
        }
        self.var_degrees = (0..nsym)
            .map(|s| self.outputs.iter().map(|&o| degs[o][s]).max().unwrap_or(0))
            .collect();
        self.const_degree = self.outputs.iter().map(|&o| degs[o][nsym]).max().unwrap_or(0);
        self.delta = self
            .outputs
            .iter()
            .map(|&o| degs[o].iter().sum::<u64>())
            .max()
            .unwrap_or(0);
    }

    #[must_use]
    pub fn nsymbols(&self) -> usize {
        self.symlens.len()
    }

    #[must_use]
    pub fn ninputs(&self) -> usize {
        self.symlens.iter().sum()
    }

    #[must_use]
    pub fn nconsts(&self) -> usize {
        self.consts.len()
    }

    #[must_use]
    pub fn noutputs(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn symlen(&self, sym: usize) -> usize {
        self.symlens[sym]
    }

    /// Whether symbol `sym` ranges over a one-hot alphabet rather than bits.
    #[must_use]
    pub fn is_sigma(&self, sym: usize) -> bool {
        self.sigmas[sym]
    }

    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    #[must_use]
    pub fn consts(&self) -> &[u64] {
        &self.consts
    }

    #[must_use]
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    #[must_use]
    pub fn outputs(&self) -> &[GateId] {
        &self.outputs
    }

    #[must_use]
    pub fn tests(&self) -> &[TestVector] {
        &self.tests
    }

    /// Maximum degree of symbol `sym`'s variables across all outputs.
    #[must_use]
    pub fn max_var_degree(&self, sym: usize) -> u64 {
        self.var_degrees[sym]
    }

    /// Maximum degree of the constants across all outputs.
    #[must_use]
    pub fn max_const_degree(&self) -> u64 {
        self.const_degree
    }

    /// Maximum total degree across all outputs; drives the kappa bound.
    #[must_use]
    pub fn delta(&self) -> u64 {
        self.delta
    }

    /// Map a flat input index to its `(symbol, bit)` position.
    #[must_use]
    pub fn symbol_of(&self, input: usize) -> (usize, usize) {
        let mut rest = input;
        for (sym, &len) in self.symlens.iter().enumerate() {
            if rest < len {
                return (sym, rest);
            }
            rest -= len;
        }
        panic!("input index {input} out of range");
    }

    /// Evaluate every output over `Z_m`. `inputs` is the flat input vector,
    /// `consts` the bound constant values.
    #[must_use]
    pub fn eval_mod(&self, inputs: &[u64], consts: &[u64], m: u64) -> Vec<u64> {
        assert_eq!(inputs.len(), self.ninputs(), "input length mismatch");
        assert_eq!(consts.len(), self.nconsts(), "const length mismatch");
        let mut vals: Vec<u64> = Vec::with_capacity(self.gates.len());
        for gate in &self.gates {
            let v = match *gate {
                Gate::Input(i) => inputs[i] % m,
                Gate::Const(c) => consts[c] % m,
                Gate::Op { op, lhs, rhs } => {
                    let (a, b) = (vals[lhs], vals[rhs]);
                    match op {
                        CircOp::Add => (a + b) % m,
                        CircOp::Sub => (a + m - b) % m,
                        CircOp::Mul => ((u128::from(a) * u128::from(b)) % u128::from(m)) as u64,
                    }
                }
            };
            vals.push(v);
        }
        self.outputs.iter().map(|&o| vals[o]).collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// f(x0, x1) = x0 + x1 over Z_2, one bit per slot: XOR.
    pub fn xor_circuit() -> Circuit {
        Circuit::new(
            vec![
                Gate::Input(0),
                Gate::Input(1),
                Gate::Op { op: CircOp::Add, lhs: 0, rhs: 1 },
            ],
            vec![2],
            vec![1, 1],
            vec![false, false],
            vec![],
            true,
            vec![
                TestVector { inputs: vec![0, 0], outputs: vec![0] },
                TestVector { inputs: vec![0, 1], outputs: vec![1] },
                TestVector { inputs: vec![1, 0], outputs: vec![1] },
                TestVector { inputs: vec![1, 1], outputs: vec![0] },
            ],
        )
        .unwrap()
    }

    /// f(x0, x1) = x0 * x1 + c with c = 1 over Z_2: NOT(AND).
    pub fn const_circuit() -> Circuit {
        Circuit::new(
            vec![
                Gate::Input(0),
                Gate::Input(1),
                Gate::Const(0),
                Gate::Op { op: CircOp::Mul, lhs: 0, rhs: 1 },
                Gate::Op { op: CircOp::Add, lhs: 3, rhs: 2 },
            ],
            vec![4],
            vec![1, 1],
            vec![false, false],
            vec![1],
            true,
            vec![
                TestVector { inputs: vec![0, 0], outputs: vec![1] },
                TestVector { inputs: vec![0, 1], outputs: vec![1] },
                TestVector { inputs: vec![1, 0], outputs: vec![1] },
                TestVector { inputs: vec![1, 1], outputs: vec![0] },
            ],
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{const_circuit, xor_circuit};
    use super::*;

    #[test]
    fn degree_analysis() {
        let c = xor_circuit();
        assert_eq!(c.max_var_degree(0), 1);
        assert_eq!(c.max_var_degree(1), 1);
        assert_eq!(c.max_const_degree(), 0);
        assert_eq!(c.delta(), 2);

        let c = const_circuit();
        assert_eq!(c.max_var_degree(0), 1);
        assert_eq!(c.max_const_degree(), 1);
        assert_eq!(c.delta(), 3);
    }

    #[test]
    fn eval_matches_test_vectors() {
        for circ in [xor_circuit(), const_circuit()] {
            for tv in circ.tests() {
                assert_eq!(circ.eval_mod(&tv.inputs, circ.consts(), 2), tv.outputs);
            }
        }
    }

    #[test]
    fn forward_reference_is_rejected() {
        let res = Circuit::new(
            vec![Gate::Op { op: CircOp::Add, lhs: 0, rhs: 1 }],
            vec![0],
            vec![1],
            vec![false],
            vec![],
            true,
            vec![],
        );
        assert!(matches!(res, Err(MifeError::InvalidInput(_))));
    }
}
