//! Hash-consed BDD package
//!
//! Shared reduced ordered BDDs over named variables. Nodes live in an arena
//! and are deduplicated through a unique table, so structurally equal
//! subdiagrams share one node and node ids are usable as memoisation keys.
//! Variable indices follow registration order, with smaller indices nearer
//! the root; the analysis traversals rely on this ordering.
//!
//! Besides the boolean connectives the manager provides `atleast` (k-of-n)
//! construction and the `minsol` operator, which reduces a monotone BDD to
//! one whose satisfying then-paths are exactly the minimal solutions.

use indexmap::IndexMap;

/// Raw node identity; stable for the lifetime of the manager
pub type NodeId = u32;

const FALSE: NodeId = 0;
const TRUE: NodeId = 1;
/// Terminal pseudo-level, below every real variable
const TERMINAL_VAR: u32 = u32::MAX;

/// Handle to a node in a [`BddManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bdd(NodeId);

impl Bdd {
    /// Hash-consed node identity, usable as a cache key
    pub fn raw(self) -> NodeId {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    var: u32,
    low: NodeId,
    high: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    And,
    Or,
}

/// Shared reduced ordered BDD manager with a variable-name registry
#[derive(Debug)]
pub struct BddManager {
    nodes: Vec<Node>,
    unique: IndexMap<(u32, NodeId, NodeId), NodeId>,
    apply_cache: IndexMap<(Op, NodeId, NodeId), NodeId>,
    not_cache: IndexMap<NodeId, NodeId>,
    minsol_cache: IndexMap<NodeId, NodeId>,
    without_cache: IndexMap<(NodeId, NodeId), NodeId>,
    names: IndexMap<String, u32>,
}

impl Default for BddManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BddManager {
    pub fn new() -> Self {
        let terminal = Node {
            var: TERMINAL_VAR,
            low: FALSE,
            high: FALSE,
        };
        Self {
            nodes: vec![terminal, terminal],
            unique: IndexMap::new(),
            apply_cache: IndexMap::new(),
            not_cache: IndexMap::new(),
            minsol_cache: IndexMap::new(),
            without_cache: IndexMap::new(),
            names: IndexMap::new(),
        }
    }

    pub fn zero(&self) -> Bdd {
        Bdd(FALSE)
    }

    pub fn one(&self) -> Bdd {
        Bdd(TRUE)
    }

    /// The variable registered under `name`, registering it if new.
    /// Registration order fixes the variable order.
    pub fn var(&mut self, name: &str) -> Bdd {
        let next = self.names.len() as u32;
        let index = *self.names.entry(name.to_string()).or_insert(next);
        Bdd(self.make_node(index, FALSE, TRUE))
    }

    /// Variable index of a registered name
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.names.get(name).copied()
    }

    /// Name registered for a variable index
    pub fn name_of(&self, var: u32) -> &str {
        self.names
            .get_index(var as usize)
            .map(|(name, _)| name.as_str())
            .unwrap_or_else(|| panic!("no variable with index {}", var))
    }

    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    /// Allocated nodes, terminals included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_zero(&self, bdd: Bdd) -> bool {
        bdd.0 == FALSE
    }

    pub fn is_one(&self, bdd: Bdd) -> bool {
        bdd.0 == TRUE
    }

    pub fn is_terminal(&self, bdd: Bdd) -> bool {
        bdd.0 <= TRUE
    }

    /// Root variable of a non-terminal node
    pub fn top_var(&self, bdd: Bdd) -> u32 {
        debug_assert!(!self.is_terminal(bdd), "terminal has no top variable");
        self.nodes[bdd.0 as usize].var
    }

    /// Cofactor with the root variable true
    pub fn then_bdd(&self, bdd: Bdd) -> Bdd {
        Bdd(self.nodes[bdd.0 as usize].high)
    }

    /// Cofactor with the root variable false
    pub fn else_bdd(&self, bdd: Bdd) -> Bdd {
        Bdd(self.nodes[bdd.0 as usize].low)
    }

    pub fn and(&mut self, f: Bdd, g: Bdd) -> Bdd {
        Bdd(self.apply(Op::And, f.0, g.0))
    }

    pub fn or(&mut self, f: Bdd, g: Bdd) -> Bdd {
        Bdd(self.apply(Op::Or, f.0, g.0))
    }

    pub fn not(&mut self, f: Bdd) -> Bdd {
        Bdd(self.negate(f.0))
    }

    /// At least `k` of the inputs are true
    pub fn atleast(&mut self, k: usize, inputs: &[Bdd]) -> Bdd {
        if k == 0 {
            return self.one();
        }
        if k > inputs.len() {
            return self.zero();
        }
        if k == inputs.len() {
            let mut result = inputs[0];
            for &input in &inputs[1..] {
                result = self.and(result, input);
            }
            return result;
        }
        if k == 1 {
            let mut result = inputs[0];
            for &input in &inputs[1..] {
                result = self.or(result, input);
            }
            return result;
        }

        // Split on the first input: either it holds and k-1 of the rest do,
        // or k of the rest do without it
        let first = inputs[0];
        let rest = &inputs[1..];
        let rest_with = self.atleast(k - 1, rest);
        let with_first = self.and(first, rest_with);
        let without_first = self.atleast(k, rest);
        self.or(with_first, without_first)
    }

    /// Minimal solutions of a monotone BDD.
    ///
    /// The then-paths of the result are exactly the minimal satisfying
    /// assignments of `f`; enumerating paths to the one-terminal and
    /// collecting the variables taken on then-edges yields the minimal cut
    /// sets.
    pub fn minsol(&mut self, f: Bdd) -> Bdd {
        Bdd(self.minsol_rec(f.0))
    }

    fn make_node(&mut self, var: u32, low: NodeId, high: NodeId) -> NodeId {
        // Reduction: both cofactors equal
        if low == high {
            return low;
        }
        let key = (var, low, high);
        if let Some(&id) = self.unique.get(&key) {
            return id;
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node { var, low, high });
        self.unique.insert(key, id);
        id
    }

    fn apply(&mut self, op: Op, f: NodeId, g: NodeId) -> NodeId {
        match op {
            Op::And => {
                if f == FALSE || g == FALSE {
                    return FALSE;
                }
                if f == TRUE {
                    return g;
                }
                if g == TRUE {
                    return f;
                }
            }
            Op::Or => {
                if f == TRUE || g == TRUE {
                    return TRUE;
                }
                if f == FALSE {
                    return g;
                }
                if g == FALSE {
                    return f;
                }
            }
        }
        if f == g {
            return f;
        }

        let key = (op, f, g);
        if let Some(&result) = self.apply_cache.get(&key) {
            return result;
        }

        let f_node = self.nodes[f as usize];
        let g_node = self.nodes[g as usize];
        // Split on the smaller (nearer-root) variable; the terminal
        // pseudo-level never wins
        let var = f_node.var.min(g_node.var);
        let (f_low, f_high) = if f_node.var == var {
            (f_node.low, f_node.high)
        } else {
            (f, f)
        };
        let (g_low, g_high) = if g_node.var == var {
            (g_node.low, g_node.high)
        } else {
            (g, g)
        };

        let low = self.apply(op, f_low, g_low);
        let high = self.apply(op, f_high, g_high);
        let result = self.make_node(var, low, high);
        self.apply_cache.insert(key, result);
        result
    }

    fn negate(&mut self, f: NodeId) -> NodeId {
        if f == FALSE {
            return TRUE;
        }
        if f == TRUE {
            return FALSE;
        }
        if let Some(&result) = self.not_cache.get(&f) {
            return result;
        }
        let node = self.nodes[f as usize];
        let low = self.negate(node.low);
        let high = self.negate(node.high);
        let result = self.make_node(node.var, low, high);
        self.not_cache.insert(f, result);
        result
    }

    fn minsol_rec(&mut self, f: NodeId) -> NodeId {
        if f <= TRUE {
            return f;
        }
        if let Some(&result) = self.minsol_cache.get(&f) {
            return result;
        }
        let node = self.nodes[f as usize];
        let low = self.minsol_rec(node.low);
        let high = self.minsol_rec(node.high);
        // Solutions already minimal without the variable subsume those with it
        let high = self.without(high, low);
        let result = self.make_node(node.var, low, high);
        self.minsol_cache.insert(f, result);
        result
    }

    /// Remove from `f` every solution set that contains a solution set of
    /// `g`. Paths are read as sets of then-edge variables.
    fn without(&mut self, f: NodeId, g: NodeId) -> NodeId {
        if g == TRUE {
            // The empty set is contained in everything
            return FALSE;
        }
        if f <= TRUE || g == FALSE {
            return f;
        }
        let key = (f, g);
        if let Some(&result) = self.without_cache.get(&key) {
            return result;
        }

        let f_node = self.nodes[f as usize];
        let g_node = self.nodes[g as usize];
        let result = if f_node.var == g_node.var {
            // Sets with the variable may subsume through either branch of g
            let high = self.without(f_node.high, g_node.high);
            let high = self.without(high, g_node.low);
            let low = self.without(f_node.low, g_node.low);
            self.make_node(f_node.var, low, high)
        } else if f_node.var < g_node.var {
            let low = self.without(f_node.low, g);
            let high = self.without(f_node.high, g);
            self.make_node(f_node.var, low, high)
        } else {
            // g's root variable does not occur in f; only g-sets without it
            // can be contained
            self.without(f, g_node.low)
        };
        self.without_cache.insert(key, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collect the then-path variable sets leading to the one-terminal
    fn paths(manager: &BddManager, bdd: Bdd) -> Vec<Vec<u32>> {
        fn walk(manager: &BddManager, bdd: Bdd, buffer: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
            if manager.is_one(bdd) {
                out.push(buffer.clone());
            } else if !manager.is_zero(bdd) {
                buffer.push(manager.top_var(bdd));
                walk(manager, manager.then_bdd(bdd), buffer, out);
                buffer.pop();
                walk(manager, manager.else_bdd(bdd), buffer, out);
            }
        }
        let mut out = Vec::new();
        walk(manager, bdd, &mut Vec::new(), &mut out);
        out
    }

    #[test]
    fn terminal_shortcuts() {
        let mut manager = BddManager::new();
        let a = manager.var("a");
        let one = manager.one();
        let zero = manager.zero();

        assert_eq!(manager.and(a, one), a);
        assert_eq!(manager.and(a, zero), zero);
        assert_eq!(manager.or(a, zero), a);
        assert_eq!(manager.or(a, one), one);
    }

    #[test]
    fn hash_consing_shares_nodes() {
        let mut manager = BddManager::new();
        let a = manager.var("a");
        let b = manager.var("b");

        let ab1 = manager.and(a, b);
        let ab2 = manager.and(a, b);
        assert_eq!(ab1.raw(), ab2.raw());

        let again = manager.var("a");
        assert_eq!(a.raw(), again.raw());
    }

    #[test]
    fn reduction_removes_redundant_tests() {
        let mut manager = BddManager::new();
        let a = manager.var("a");
        let not_a = manager.not(a);

        let tautology = manager.or(a, not_a);
        assert!(manager.is_one(tautology));
        let contradiction = manager.and(a, not_a);
        assert!(manager.is_zero(contradiction));
    }

    #[test]
    fn variable_order_follows_registration() {
        let mut manager = BddManager::new();
        let a = manager.var("a");
        let b = manager.var("b");
        let ab = manager.and(a, b);

        // The earlier-registered variable sits at the root
        assert_eq!(manager.top_var(ab), 0);
        assert_eq!(manager.top_var(manager.then_bdd(ab)), 1);
        assert_eq!(manager.index_of("a"), Some(0));
        assert_eq!(manager.name_of(1), "b");
    }

    #[test]
    fn atleast_two_of_three() {
        let mut manager = BddManager::new();
        let a = manager.var("a");
        let b = manager.var("b");
        let c = manager.var("c");

        let vote = manager.atleast(2, &[a, b, c]);
        let min = manager.minsol(vote);
        let mut sets = paths(&manager, min);
        sets.sort();
        assert_eq!(sets, vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
    }

    #[test]
    fn minsol_drops_subsumed_solutions() {
        let mut manager = BddManager::new();
        let a = manager.var("a");
        let b = manager.var("b");
        let c = manager.var("c");

        // a OR (b AND c): {a} subsumes every superset containing a
        let bc = manager.and(b, c);
        let f = manager.or(a, bc);
        let min = manager.minsol(f);

        let mut sets = paths(&manager, min);
        sets.sort();
        assert_eq!(sets, vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn minsol_of_shared_variable_structures() {
        let mut manager = BddManager::new();
        let a = manager.var("a");
        let b = manager.var("b");
        let c = manager.var("c");

        // (a AND b) OR (b AND c)
        let ab = manager.and(a, b);
        let bc = manager.and(b, c);
        let f = manager.or(ab, bc);
        let min = manager.minsol(f);

        let mut sets = paths(&manager, min);
        sets.sort();
        assert_eq!(sets, vec![vec![0, 1], vec![1, 2]]);
    }
}
